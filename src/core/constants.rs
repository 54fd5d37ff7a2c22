//! Protocol constants.
//!
//! Wire-level values are fixed by the protocol and MUST NOT be changed
//! without breaking interoperability between client and server builds.
//! Tunables live in [`TransportConfig`](super::TransportConfig); the
//! values here are only their defaults.

use std::time::Duration;

// =============================================================================
// HEADER BYTE
// =============================================================================

/// Mask selecting the header type from the first byte of a datagram.
pub const HEADER_TYPE_MASK: u8 = 0x0F;

/// Mask of the reserved flag bits in the first byte (written as zero).
pub const HEADER_FLAGS_MASK: u8 = 0xF0;

// =============================================================================
// SIZES
// =============================================================================

/// Size of the header byte.
pub const HEADER_SIZE: usize = 1;

/// Size of the sequence field carried by Reliable, Notify and Ack.
pub const SEQUENCE_SIZE: usize = 2;

/// Largest payload the framer accepts.
pub const MAX_PAYLOAD_SIZE: usize = 1200;

/// Largest datagram the framer produces.
pub const MAX_DATAGRAM_SIZE: usize = HEADER_SIZE + SEQUENCE_SIZE + MAX_PAYLOAD_SIZE;

/// Default receive buffer size for the socket reader.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65535;

// =============================================================================
// RECEIVE WINDOW
// =============================================================================

/// Number of sequences tracked behind the highest received sequence.
///
/// Also bounds how far ahead of the oldest unacknowledged message a sender
/// may run, so it must stay below half the 16-bit wire sequence space.
pub const RECEIVE_WINDOW_SIZE: u64 = 2048;

// =============================================================================
// TIMING DEFAULTS
// =============================================================================

/// Delay before an unacknowledged message is sent again.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Resends allowed before the connection is considered dead.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Interval between liveness probes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Idle timeout expressed in heartbeat intervals.
pub const DEFAULT_TIMEOUT_MULTIPLIER: u32 = 5;

/// How long a client keeps trying to complete the handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period between a local close and teardown.
pub const DEFAULT_DISCONNECT_GRACE: Duration = Duration::from_millis(100);

// =============================================================================
// CAPACITY DEFAULTS
// =============================================================================

/// Default connection limit for a server.
pub const DEFAULT_MAX_CONNECTIONS: usize = 16;

/// Datagrams queued for the socket writer before sends report congestion.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 1024;

/// Datagrams buffered between the socket reader and `poll()`.
pub const DEFAULT_INBOUND_QUEUE_CAPACITY: usize = 1024;

/// First connection id handed out by a server.
pub const FIRST_CONNECTION_ID: u16 = 1;
