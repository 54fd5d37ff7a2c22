//! Reliant - Transport Layer
//!
//! Binds the socket-free [`PeerCore`](crate::protocol::PeerCore) to a tokio
//! UDP socket:
//!
//! - **Socket driver**: [`PeerSocket`] with a reader task and a writer task
//! - **Send handles**: [`SendHandle`] for queueing sends from other threads
//!
//! The poll loop remains the only code that mutates connection state; the
//! background tasks only move bytes between the socket and bounded queues.

mod endpoint;
mod handle;
mod socket;

pub(crate) use endpoint::Endpoint;
pub use handle::SendHandle;
pub use socket::{Inbound, PeerSocket};
