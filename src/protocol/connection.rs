//! Per-remote connection state.

use std::net::SocketAddr;
use std::time::Instant;

use super::heartbeat::Liveness;
use super::reliability::{Acked, ReliabilityManager};
use super::timing::RttEstimator;
use crate::core::constants::RECEIVE_WINDOW_SIZE;

/// Identifier of a connection within one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u16);

impl ConnectionId {
    /// Create an id from its raw value.
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Raw value, as carried in Welcome and roster messages.
    pub fn get(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection lifecycle state.
///
/// States only ever move forward in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Handshake complete, data flowing.
    Connected,
    /// Local close sent, waiting out the grace period.
    Disconnecting,
    /// Torn down; terminal.
    Disconnected,
}

/// Result of checking an inbound sequence against the receive window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// First time seen; deliver.
    Fresh(u64),
    /// Seen before (or older than the window); ack again, do not deliver.
    Duplicate(u64),
    /// Further ahead than any sender could be; drop without an ack.
    OutOfRange(u64),
}

/// Sliding bitmask of recently received sequences.
#[derive(Debug, Clone)]
pub struct ReceiveWindow {
    /// Highest sequence seen, `None` before the first.
    highest: Option<u64>,
    /// Bit `i` marks sequence `highest - 1 - i` as seen.
    window: [u64; Self::WORDS],
}

impl Default for ReceiveWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveWindow {
    /// Window size in bits.
    pub const WINDOW_SIZE: usize = RECEIVE_WINDOW_SIZE as usize;

    const WORDS: usize = Self::WINDOW_SIZE / 64;

    /// Create an empty window.
    pub fn new() -> Self {
        Self {
            highest: None,
            window: [0; Self::WORDS],
        }
    }

    /// Highest sequence seen so far.
    pub fn highest(&self) -> Option<u64> {
        self.highest
    }

    /// Reconstruct a full sequence from its low 16 bits.
    ///
    /// Picks the candidate closest to the sequence after the highest seen.
    pub fn expand(&self, wire: u16) -> u64 {
        const SPACE: u64 = 1 << 16;
        const HALF: u64 = SPACE / 2;

        let Some(highest) = self.highest else {
            return wire as u64;
        };

        let expected = highest + 1;
        let candidate = (expected & !(SPACE - 1)) | wire as u64;

        if candidate + HALF <= expected {
            candidate + SPACE
        } else if candidate > expected + HALF && candidate >= SPACE {
            candidate - SPACE
        } else {
            candidate
        }
    }

    /// Whether `sequence` could have been sent by a live remote.
    ///
    /// Senders never run more than one window ahead of the oldest
    /// unacknowledged message, so nothing valid lies further than
    /// `WINDOW_SIZE` past the highest sequence seen. Sequences start at 1.
    pub fn in_range(&self, sequence: u64) -> bool {
        sequence != 0 && sequence <= self.highest.unwrap_or(0) + RECEIVE_WINDOW_SIZE
    }

    /// Check a full sequence and mark it as seen.
    ///
    /// Returns `true` if it had not been seen and lies inside the window.
    /// Out-of-range sequences return `false` and leave the window untouched.
    pub fn check_and_mark(&mut self, sequence: u64) -> bool {
        if !self.in_range(sequence) {
            return false;
        }
        let Some(highest) = self.highest else {
            self.highest = Some(sequence);
            return true;
        };

        if sequence > highest {
            self.shift_window((sequence - highest) as usize);
            self.highest = Some(sequence);
            return true;
        }
        if sequence == highest {
            return false;
        }

        let offset = (highest - sequence) as usize;
        if offset > Self::WINDOW_SIZE {
            return false;
        }

        let offset = offset - 1;
        let mask = 1u64 << (offset % 64);
        let word = &mut self.window[offset / 64];
        if *word & mask != 0 {
            false
        } else {
            *word |= mask;
            true
        }
    }

    /// Check a wire sequence and mark it as seen.
    pub fn accept(&mut self, wire: u16) -> SequenceCheck {
        let sequence = self.expand(wire);
        if !self.in_range(sequence) {
            SequenceCheck::OutOfRange(sequence)
        } else if self.check_and_mark(sequence) {
            SequenceCheck::Fresh(sequence)
        } else {
            SequenceCheck::Duplicate(sequence)
        }
    }

    fn shift_window(&mut self, shift: usize) {
        if shift > Self::WINDOW_SIZE {
            self.window = [0; Self::WORDS];
            return;
        }

        let word_shift = shift / 64;
        let bit_shift = shift % 64;

        if word_shift > 0 {
            for i in (0..Self::WORDS).rev() {
                self.window[i] = if i >= word_shift {
                    self.window[i - word_shift]
                } else {
                    0
                };
            }
        }

        if bit_shift > 0 {
            let mut carry = 0u64;
            for i in 0..Self::WORDS {
                let next_carry = self.window[i] >> (64 - bit_shift);
                self.window[i] = (self.window[i] << bit_shift) | carry;
                carry = next_carry;
            }
        }

        // The previous highest now sits at offset `shift - 1`.
        let offset = shift - 1;
        self.window[offset / 64] |= 1u64 << (offset % 64);
    }
}

/// Traffic counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Datagrams written, resends included.
    pub datagrams_sent: u64,
    /// Datagrams received.
    pub datagrams_received: u64,
    /// Resends of pending messages.
    pub resends: u64,
    /// Duplicate Reliable/Notify payloads suppressed.
    pub duplicates: u64,
    /// Sequenced datagrams dropped as too far ahead of the window.
    pub out_of_range: u64,
}

/// State for one remote endpoint.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    remote: SocketAddr,
    state: ConnectionState,
    /// Created by a local `connect` (client side).
    outgoing: bool,
    created_at: Instant,

    next_out_seq: u64,
    highest_acked_seq: u64,
    window: ReceiveWindow,
    reliability: ReliabilityManager,

    liveness: Liveness,
    rtt: RttEstimator,
    teardown_at: Option<Instant>,
    stats: ConnectionStats,
}

impl Connection {
    fn new(id: ConnectionId, remote: SocketAddr, outgoing: bool, now: Instant) -> Self {
        Self {
            id,
            remote,
            state: ConnectionState::Connecting,
            outgoing,
            created_at: now,

            next_out_seq: 1,
            highest_acked_seq: 0,
            window: ReceiveWindow::new(),
            reliability: ReliabilityManager::new(),

            liveness: Liveness::new(now),
            rtt: RttEstimator::new(),
            teardown_at: None,
            stats: ConnectionStats::default(),
        }
    }

    /// A connection we initiated.
    pub fn outgoing(id: ConnectionId, remote: SocketAddr, now: Instant) -> Self {
        Self::new(id, remote, true, now)
    }

    /// A connection initiated by the remote.
    pub fn incoming(id: ConnectionId, remote: SocketAddr, now: Instant) -> Self {
        Self::new(id, remote, false, now)
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote endpoint.
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the connection completed its handshake and is not closing.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Whether this side initiated the connection.
    pub fn is_outgoing(&self) -> bool {
        self.outgoing
    }

    /// When the connection was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Move to a later state. Returns `false` (and stays put) for any
    /// transition that is not strictly forward.
    pub fn advance(&mut self, to: ConnectionState) -> bool {
        if to <= self.state {
            return false;
        }
        self.state = to;
        true
    }

    /// Enter `Disconnecting`; teardown happens at `deadline`.
    ///
    /// Pending sends are dropped since nothing will resend them.
    pub fn begin_disconnect(&mut self, deadline: Instant) -> bool {
        if !self.advance(ConnectionState::Disconnecting) {
            return false;
        }
        self.teardown_at = Some(deadline);
        self.reliability.clear();
        true
    }

    /// Enter the terminal state and drop all pending sends.
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.teardown_at = None;
        self.reliability.clear();
    }

    /// Teardown deadline while disconnecting.
    pub fn teardown_at(&self) -> Option<Instant> {
        self.teardown_at
    }

    /// Sequence the next Reliable/Notify send will use.
    pub fn peek_sequence(&self) -> u64 {
        self.next_out_seq
    }

    /// Take the next outbound sequence.
    pub fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_out_seq;
        self.next_out_seq += 1;
        sequence
    }

    /// Highest sequence the remote has acknowledged.
    pub fn highest_acked_seq(&self) -> u64 {
        self.highest_acked_seq
    }

    /// Check an inbound Reliable/Notify sequence against the dedup window.
    pub fn accept_sequence(&mut self, wire: u16) -> SequenceCheck {
        let check = self.window.accept(wire);
        match check {
            SequenceCheck::Fresh(_) => {}
            SequenceCheck::Duplicate(_) => self.stats.duplicates += 1,
            SequenceCheck::OutOfRange(_) => self.stats.out_of_range += 1,
        }
        check
    }

    /// Settle a pending send. `None` means a duplicate ack.
    pub fn on_ack(&mut self, wire: u16, now: Instant) -> Option<Acked> {
        let acked = self.reliability.acknowledge(wire, now)?;
        self.highest_acked_seq = self.highest_acked_seq.max(acked.sequence);
        if let Some(sample) = acked.rtt_sample {
            self.rtt.update(sample);
        }
        Some(acked)
    }

    /// Record a datagram written to this remote.
    pub fn on_datagram_sent(&mut self, now: Instant) {
        self.liveness.on_send(now);
        self.stats.datagrams_sent += 1;
    }

    /// Record a datagram received from this remote.
    pub fn on_datagram_received(&mut self, now: Instant) {
        self.liveness.on_receive(now);
        self.stats.datagrams_received += 1;
    }

    /// Record a resend of a pending message.
    pub fn on_resend(&mut self) {
        self.stats.resends += 1;
    }

    /// Pending-send table.
    pub fn reliability(&self) -> &ReliabilityManager {
        &self.reliability
    }

    /// Mutable pending-send table.
    pub fn reliability_mut(&mut self) -> &mut ReliabilityManager {
        &mut self.reliability
    }

    /// Activity timestamps.
    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Mutable activity timestamps.
    pub fn liveness_mut(&mut self) -> &mut Liveness {
        &mut self.liveness
    }

    /// Round-trip estimate.
    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    /// Traffic counters.
    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }
}
