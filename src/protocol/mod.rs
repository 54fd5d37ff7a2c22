//! Reliant - Protocol Layer
//!
//! Everything that does not need a socket or a clock lives here:
//!
//! - **Framing**: [`HeaderType`], [`Message`] and the datagram codec
//! - **Connections**: [`Connection`] lifecycle and the [`ReceiveWindow`] dedup window
//! - **Reliability**: [`ReliabilityManager`] tracking unacknowledged sends
//! - **Liveness**: heartbeat decisions and idle detection
//! - **Scheduling**: the [`Scheduler`] of delayed resend and heartbeat events
//! - **Orchestration**: [`PeerCore`], the sans-IO peer driven by `Instant`s
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Server / Client                 │
//! ├─────────────────────────────────────────┤
//! │         PeerSocket (tokio)              │
//! ├─────────────────────────────────────────┤
//! │         PeerCore                        │  ← This module
//! │   framing, reliability, heartbeats      │
//! ├─────────────────────────────────────────┤
//! │              UDP                        │
//! └─────────────────────────────────────────┘
//! ```

mod connection;
pub mod frame;
pub mod heartbeat;
mod peer;
mod reliability;
mod scheduler;
mod timing;

pub use connection::{
    Connection, ConnectionId, ConnectionState, ConnectionStats, ReceiveWindow, SequenceCheck,
};
pub use frame::{DeliveryMode, HeaderType, Message};
pub use heartbeat::{HeartbeatAction, Liveness, Verdict};
pub use peer::{CLIENT_CONNECTION_ID, PeerCore, PeerEvent, RejectReason, Role, Transmit};
pub use reliability::{Acked, PendingMessage, ReliabilityManager, ResendOutcome};
pub use scheduler::{DelayedEvent, Scheduler};
pub use timing::{RttEstimator, constants as timing_constants};
