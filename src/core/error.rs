//! Error types for the Reliant transport.
//!
//! Nothing here ever stops the poll loop. A bad datagram is dropped where it
//! was decoded, a broken connection surfaces as a `Disconnected` event, and
//! only socket setup errors reach the caller of `start`/`connect`.

use std::io;

use thiserror::Error;

/// Typed reason code for every failure the transport can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The remote host name could not be resolved.
    DnsResolve,
    /// The remote peer refused the handshake.
    Refused,
    /// The remote peer stopped answering.
    Timeout,
    /// Too many outbound messages are queued.
    Congestion,
    /// A malformed datagram was received.
    InvalidReceive,
    /// The caller supplied something that cannot be sent.
    InvalidSend,
    /// The connection was closed by either side.
    ConnectionClosed,
    /// Any other socket-level fault.
    Unexpected,
}

/// Reason attached to a `Disconnected` event.
pub type DisconnectReason = ErrorCode;

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCode::DnsResolve => "dns resolve",
            ErrorCode::Refused => "refused",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Congestion => "congestion",
            ErrorCode::InvalidReceive => "invalid receive",
            ErrorCode::InvalidSend => "invalid send",
            ErrorCode::ConnectionClosed => "connection closed",
            ErrorCode::Unexpected => "unexpected",
        };
        f.write_str(name)
    }
}

/// Errors produced while encoding or decoding a datagram.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Zero-length datagram.
    #[error("empty datagram")]
    Empty,

    /// Datagram shorter than its header requires.
    #[error("truncated header: need {needed} bytes, got {actual}")]
    Truncated {
        /// Bytes the header needs.
        needed: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Header type value outside the known set.
    #[error("unknown header type: 0x{0:02x}")]
    UnknownHeader(u8),

    /// A sequenced header was encoded without a sequence.
    #[error("header requires a sequence number")]
    MissingSequence,

    /// An unsequenced header was encoded with a sequence.
    #[error("header does not carry a sequence number")]
    UnexpectedSequence,

    /// Payload larger than the framer allows.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size.
        size: usize,
        /// Maximum size.
        max: usize,
    },
}

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An interval was zero.
    #[error("{0} must be non-zero")]
    ZeroInterval(&'static str),

    /// The idle timeout would not leave room for a late heartbeat.
    #[error("timeout multiplier must be at least 3, got {0}")]
    TimeoutMultiplier(u32),

    /// Retry ceiling of zero.
    #[error("max retries must be at least 1")]
    NoRetries,

    /// Connection limit of zero.
    #[error("max connections must be at least 1")]
    NoConnections,

    /// Queue capacity of zero.
    #[error("{0} capacity must be at least 1")]
    ZeroCapacity(&'static str),

    /// Payload limit above what the framer can carry.
    #[error("max payload size {size} exceeds framer limit {max}")]
    PayloadLimit {
        /// Requested limit.
        size: usize,
        /// Framer limit.
        max: usize,
    },
}

/// Transport errors returned at call boundaries.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Host name resolution failed.
    #[error("failed to resolve {0}")]
    DnsResolve(String),

    /// The remote peer rejected the connection.
    #[error("connection refused")]
    Refused,

    /// The operation or connection timed out.
    #[error("timed out")]
    Timeout,

    /// Outbound queues are full.
    #[error("outbound queue full")]
    Congestion,

    /// Malformed datagram.
    #[error("invalid datagram: {0}")]
    InvalidReceive(#[from] FrameError),

    /// The caller asked for something that cannot be sent.
    #[error("invalid send: {0}")]
    InvalidSend(String),

    /// The connection is closed or unknown.
    #[error("connection closed")]
    ConnectionClosed,

    /// Socket error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Configuration rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TransportError {
    /// Map this error onto the transport's reason codes.
    pub fn code(&self) -> ErrorCode {
        match self {
            TransportError::DnsResolve(_) => ErrorCode::DnsResolve,
            TransportError::Refused => ErrorCode::Refused,
            TransportError::Timeout => ErrorCode::Timeout,
            TransportError::Congestion => ErrorCode::Congestion,
            TransportError::InvalidReceive(_) => ErrorCode::InvalidReceive,
            TransportError::InvalidSend(_) => ErrorCode::InvalidSend,
            TransportError::ConnectionClosed => ErrorCode::ConnectionClosed,
            TransportError::Io(_) | TransportError::Config(_) => ErrorCode::Unexpected,
        }
    }

    /// Check if this error ends the connection it occurred on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Timeout | ErrorCode::ConnectionClosed | ErrorCode::Unexpected
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
