//! Datagram framing.
//!
//! ```text
//! byte 0      : header type (low 4 bits), reserved flags (high 4 bits)
//! bytes 1..3  : sequence, u16 LE (Reliable, Notify and Ack only)
//! bytes 3..   : payload
//! ```

use crate::core::FrameError;
use crate::core::constants::{HEADER_FLAGS_MASK, HEADER_SIZE, HEADER_TYPE_MASK, SEQUENCE_SIZE};

/// Size constants derived from the wire layout.
pub mod sizes {
    pub use crate::core::constants::{
        HEADER_SIZE, MAX_DATAGRAM_SIZE, MAX_PAYLOAD_SIZE, SEQUENCE_SIZE,
    };

    /// Header size of a sequenced message.
    pub const SEQUENCED_HEADER_SIZE: usize = HEADER_SIZE + SEQUENCE_SIZE;
}

/// Message header types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HeaderType {
    /// Fire-and-forget payload.
    Unreliable = 0x00,
    /// Acknowledges a Reliable or Notify sequence.
    Ack = 0x01,
    /// Client handshake request.
    Connect = 0x02,
    /// Server refused the handshake.
    Reject = 0x03,
    /// Liveness probe.
    Heartbeat = 0x04,
    /// Voluntary teardown.
    Disconnect = 0x05,
    /// Acknowledged payload, no ordering.
    Notify = 0x06,
    /// Acknowledged payload, retransmitted until acked.
    Reliable = 0x07,
    /// Server accepted the handshake.
    Welcome = 0x08,
    /// Roster: another client joined.
    ClientConnected = 0x09,
    /// Roster: another client left.
    ClientDisconnected = 0x0A,
}

impl HeaderType {
    /// Parse a header type from the first byte of a datagram.
    ///
    /// Reserved flag bits are masked off.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte & HEADER_TYPE_MASK {
            0x00 => Some(Self::Unreliable),
            0x01 => Some(Self::Ack),
            0x02 => Some(Self::Connect),
            0x03 => Some(Self::Reject),
            0x04 => Some(Self::Heartbeat),
            0x05 => Some(Self::Disconnect),
            0x06 => Some(Self::Notify),
            0x07 => Some(Self::Reliable),
            0x08 => Some(Self::Welcome),
            0x09 => Some(Self::ClientConnected),
            0x0A => Some(Self::ClientDisconnected),
            _ => None,
        }
    }

    /// Convert the header type to its byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether this header carries a sequence field.
    pub fn is_sequenced(self) -> bool {
        matches!(self, Self::Reliable | Self::Notify | Self::Ack)
    }

    /// Size of the encoded header for this type.
    pub fn header_size(self) -> usize {
        if self.is_sequenced() {
            sizes::SEQUENCED_HEADER_SIZE
        } else {
            HEADER_SIZE
        }
    }
}

/// How a payload is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// Sent once, no acknowledgment.
    Unreliable,
    /// Acknowledged and retransmitted, no ordering.
    Notify,
    /// Acknowledged and retransmitted until acked.
    Reliable,
}

impl DeliveryMode {
    /// Header type used on the wire for this mode.
    pub fn header(self) -> HeaderType {
        match self {
            Self::Unreliable => HeaderType::Unreliable,
            Self::Notify => HeaderType::Notify,
            Self::Reliable => HeaderType::Reliable,
        }
    }

    /// Delivery mode of a data-carrying header.
    pub fn from_header(header: HeaderType) -> Option<Self> {
        match header {
            HeaderType::Unreliable => Some(Self::Unreliable),
            HeaderType::Notify => Some(Self::Notify),
            HeaderType::Reliable => Some(Self::Reliable),
            _ => None,
        }
    }

    /// Whether sends in this mode are tracked until acknowledged.
    pub fn is_acknowledged(self) -> bool {
        !matches!(self, Self::Unreliable)
    }
}

/// A decoded (or to-be-encoded) message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    /// Header type.
    pub header: HeaderType,
    /// Wire sequence, present iff the header is sequenced.
    pub sequence: Option<u16>,
    /// Payload bytes.
    pub payload: &'a [u8],
}

impl<'a> Message<'a> {
    /// Message without sequence.
    pub fn new(header: HeaderType, payload: &'a [u8]) -> Self {
        Self {
            header,
            sequence: None,
            payload,
        }
    }

    /// Message with a sequence.
    pub fn sequenced(header: HeaderType, sequence: u16, payload: &'a [u8]) -> Self {
        Self {
            header,
            sequence: Some(sequence),
            payload,
        }
    }

    /// Encode into a new datagram.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(self.header, self.sequence, self.payload)
    }

    /// Decode a datagram, borrowing its payload.
    pub fn decode(datagram: &'a [u8]) -> Result<Self, FrameError> {
        decode(datagram)
    }
}

/// Encode a header, optional sequence and payload into a datagram.
pub fn encode(
    header: HeaderType,
    sequence: Option<u16>,
    payload: &[u8],
) -> Result<Vec<u8>, FrameError> {
    if payload.len() > sizes::MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: sizes::MAX_PAYLOAD_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(header.header_size() + payload.len());
    buf.push(header.as_byte() & !HEADER_FLAGS_MASK);

    match (header.is_sequenced(), sequence) {
        (true, Some(seq)) => buf.extend_from_slice(&seq.to_le_bytes()),
        (true, None) => return Err(FrameError::MissingSequence),
        (false, Some(_)) => return Err(FrameError::UnexpectedSequence),
        (false, None) => {}
    }

    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decode a datagram into its header, optional sequence and payload.
pub fn decode(datagram: &[u8]) -> Result<Message<'_>, FrameError> {
    let first = *datagram.first().ok_or(FrameError::Empty)?;
    let header = HeaderType::from_byte(first)
        .ok_or(FrameError::UnknownHeader(first & HEADER_TYPE_MASK))?;

    if !header.is_sequenced() {
        return Ok(Message::new(header, &datagram[HEADER_SIZE..]));
    }

    if datagram.len() < sizes::SEQUENCED_HEADER_SIZE {
        return Err(FrameError::Truncated {
            needed: sizes::SEQUENCED_HEADER_SIZE,
            actual: datagram.len(),
        });
    }

    let sequence = u16::from_le_bytes([datagram[1], datagram[2]]);
    Ok(Message::sequenced(
        header,
        sequence,
        &datagram[HEADER_SIZE + SEQUENCE_SIZE..],
    ))
}

/// Encode an acknowledgment for a wire sequence.
pub fn encode_ack(sequence: u16) -> Vec<u8> {
    let seq = sequence.to_le_bytes();
    vec![HeaderType::Ack.as_byte(), seq[0], seq[1]]
}

/// Encode a payload-free control message.
pub fn encode_control(header: HeaderType) -> Vec<u8> {
    vec![header.as_byte()]
}

/// Encode a control message carrying a connection id.
pub fn encode_with_id(header: HeaderType, id: u16) -> Vec<u8> {
    let id = id.to_le_bytes();
    vec![header.as_byte(), id[0], id[1]]
}

/// Read a connection id from a control payload.
pub fn read_id(payload: &[u8]) -> Option<u16> {
    match payload {
        [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}
