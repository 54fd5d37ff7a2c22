//! Retransmission bookkeeping for Reliable and Notify sends.
//!
//! Every acknowledged-mode send becomes a [`PendingMessage`] and a resend
//! event in the scheduler. The event carries the message's send version at
//! scheduling time; when it fires, a version mismatch (or a missing message)
//! means the send was already handled and the event does nothing.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::core::constants::RECEIVE_WINDOW_SIZE;

/// An unacknowledged send.
#[derive(Debug, Clone)]
pub struct PendingMessage {
    sequence: u64,
    bytes: Vec<u8>,
    first_send_time: Instant,
    last_send_time: Instant,
    retry_count: u32,
    /// Bumped on every (re)send; resend events compare against it.
    version: u32,
}

impl PendingMessage {
    fn new(sequence: u64, bytes: Vec<u8>, now: Instant) -> Self {
        Self {
            sequence,
            bytes,
            first_send_time: now,
            last_send_time: now,
            retry_count: 0,
            version: 1,
        }
    }

    /// Full sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Encoded datagram.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// When the message was last written to the socket.
    pub fn last_send_time(&self) -> Instant {
        self.last_send_time
    }

    /// Resends so far.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Current send version.
    pub fn version(&self) -> u32 {
        self.version
    }
}

/// What to do when a resend event fires.
#[derive(Debug, PartialEq, Eq)]
pub enum ResendOutcome<'a> {
    /// Already acked or resent since scheduling.
    Stale,
    /// Write these bytes again and schedule the next resend at `version`.
    Resend {
        /// Datagram to write.
        bytes: &'a [u8],
        /// New send version.
        version: u32,
    },
    /// Retry ceiling exceeded; the connection must time out.
    Exhausted,
}

/// A settled send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acked {
    /// Full sequence that was acknowledged.
    pub sequence: u64,
    /// Round-trip sample, only for messages never resent.
    pub rtt_sample: Option<Duration>,
}

/// In-flight table for one connection.
#[derive(Debug, Default)]
pub struct ReliabilityManager {
    pending: BTreeMap<u64, PendingMessage>,
}

impl ReliabilityManager {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `sequence` can be sent without outrunning the receive window.
    pub fn can_send(&self, sequence: u64) -> bool {
        match self.oldest_sequence() {
            Some(oldest) => sequence - oldest < RECEIVE_WINDOW_SIZE,
            None => true,
        }
    }

    /// Track a freshly written message. Returns its send version.
    pub fn register(&mut self, sequence: u64, bytes: Vec<u8>, now: Instant) -> u32 {
        let message = PendingMessage::new(sequence, bytes, now);
        let version = message.version;
        self.pending.insert(sequence, message);
        version
    }

    /// Map a 16-bit wire sequence onto a pending full sequence.
    ///
    /// Pending sequences never span more than the receive window, which is
    /// far below the wire space, so the mapping is unambiguous.
    pub fn resolve(&self, wire: u16) -> Option<u64> {
        let oldest = self.oldest_sequence()?;
        let delta = wire.wrapping_sub(oldest as u16) as u64;
        let sequence = oldest + delta;
        self.pending.contains_key(&sequence).then_some(sequence)
    }

    /// Settle the message acknowledged by `wire`.
    ///
    /// Returns `None` for duplicate or unknown acks.
    pub fn acknowledge(&mut self, wire: u16, now: Instant) -> Option<Acked> {
        let sequence = self.resolve(wire)?;
        let message = self.pending.remove(&sequence)?;
        let rtt_sample = (message.retry_count == 0)
            .then(|| now.saturating_duration_since(message.first_send_time));
        Some(Acked {
            sequence,
            rtt_sample,
        })
    }

    /// Handle a fired resend event.
    pub fn on_resend_due(
        &mut self,
        sequence: u64,
        version: u32,
        now: Instant,
        max_retries: u32,
    ) -> ResendOutcome<'_> {
        let Some(message) = self.pending.get_mut(&sequence) else {
            return ResendOutcome::Stale;
        };
        if message.version != version {
            return ResendOutcome::Stale;
        }
        if message.retry_count >= max_retries {
            return ResendOutcome::Exhausted;
        }

        message.retry_count += 1;
        message.last_send_time = now;
        message.version = message.version.wrapping_add(1);
        ResendOutcome::Resend {
            bytes: &message.bytes,
            version: message.version,
        }
    }

    /// Oldest unacknowledged sequence.
    pub fn oldest_sequence(&self) -> Option<u64> {
        self.pending.keys().next().copied()
    }

    /// Look up a pending message.
    pub fn get(&self, sequence: u64) -> Option<&PendingMessage> {
        self.pending.get(&sequence)
    }

    /// Number of unacknowledged messages.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Discard every pending message.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
