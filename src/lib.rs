//! # Reliant
//!
//! A lightweight reliable-messaging layer over UDP for real-time,
//! client/server applications.
//!
//! Each message is sent with one of three delivery modes:
//!
//! - **Unreliable**: fire and forget, no sequence, no ack
//! - **Notify**: sequenced and acknowledged, at-least-once, deduplicated
//! - **Reliable**: sequenced and acknowledged, at-least-once, deduplicated
//!
//! Around those sit a small connection handshake (`Connect` / `Welcome` /
//! `Reject`), heartbeats with idle timeout, retransmission with a retry
//! ceiling, and a roster that tells clients when other clients come and go.
//! Ordering across messages is not guaranteed.
//!
//! ## Feature Flags
//!
//! - `transport` (default): tokio UDP driver and send handles
//! - `server` (default): [`Server`](server::Server)
//! - `client` (default): [`Client`](client::Client)
//!
//! ## Modules
//!
//! - [`core`]: constants, configuration and error types (always included)
//! - [`protocol`]: framing and the socket-free peer state machine (always included)
//! - [`transport`]: tokio socket driver (requires `transport` feature)
//! - [`server`], [`client`]: the two peer roles
//!
//! ## Example Usage
//!
//! The socket-free core can be driven by hand, which is how the test suite
//! exercises timeouts without sleeping:
//!
//! ```rust
//! use std::time::Instant;
//! use reliant::prelude::*;
//!
//! let server_addr = "127.0.0.1:7000".parse().unwrap();
//! let client_addr = "127.0.0.1:7001".parse().unwrap();
//! let now = Instant::now();
//!
//! let mut server = PeerCore::server(TransportConfig::default()).unwrap();
//! let mut client = PeerCore::client(TransportConfig::default()).unwrap();
//! client.connect(server_addr, now).unwrap();
//!
//! // Connect -> server, Welcome -> client.
//! let connect = client.poll_transmit().unwrap();
//! server.handle_datagram(client_addr, &connect.contents, now).unwrap();
//! let welcome = server.poll_transmit().unwrap();
//! client.handle_datagram(server_addr, &welcome.contents, now).unwrap();
//!
//! assert!(matches!(client.poll_event(), Some(PeerEvent::Connected { .. })));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Socket-free protocol (always included)
pub mod protocol;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

// Server API (feature-gated)
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::protocol::{
        ConnectionId, ConnectionState, DeliveryMode, PeerCore, PeerEvent, RejectReason, Role,
        Transmit,
    };

    #[cfg(feature = "transport")]
    pub use crate::transport::SendHandle;

    #[cfg(feature = "client")]
    pub use crate::client::Client;

    #[cfg(feature = "server")]
    pub use crate::server::Server;
}

// Re-export commonly used items at crate root
pub use core::{DisconnectReason, ErrorCode, TransportConfig, TransportError, TransportResult};
pub use protocol::{ConnectionId, DeliveryMode, PeerEvent};
