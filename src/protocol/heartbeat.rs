//! Heartbeat monitor.
//!
//! Each live connection owns a recurring heartbeat event. When it fires, a
//! `Heartbeat` is written only if nothing else went out during the last half
//! interval, so outbound silence never exceeds one and a half intervals plus
//! poll lateness. Idle detection is a separate per-poll sweep comparing the last
//! inbound activity against `heartbeat_interval * timeout_multiplier`.

use std::time::{Duration, Instant};

use super::connection::{Connection, ConnectionState};
use crate::core::TransportConfig;

/// Last inbound and outbound activity on a connection.
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    last_received: Instant,
    last_sent: Instant,
}

impl Liveness {
    /// Start tracking at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            last_received: now,
            last_sent: now,
        }
    }

    /// Record inbound traffic of any kind.
    pub fn on_receive(&mut self, now: Instant) {
        if now > self.last_received {
            self.last_received = now;
        }
    }

    /// Record outbound traffic of any kind.
    pub fn on_send(&mut self, now: Instant) {
        if now > self.last_sent {
            self.last_sent = now;
        }
    }

    /// When the remote was last heard from.
    pub fn last_received(&self) -> Instant {
        self.last_received
    }

    /// When we last wrote to the remote.
    pub fn last_sent(&self) -> Instant {
        self.last_sent
    }

    /// Time since the remote was last heard from.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_received)
    }

    /// Whether a probe is needed to keep outbound traffic flowing.
    ///
    /// True once nothing has gone out for half of `interval`.
    pub fn needs_probe(&self, now: Instant, interval: Duration) -> bool {
        now.saturating_duration_since(self.last_sent) >= interval / 2
    }

    /// Whether the remote has been silent longer than `idle_timeout`.
    pub fn is_timed_out(&self, now: Instant, idle_timeout: Duration) -> bool {
        self.idle_for(now) > idle_timeout
    }
}

/// What a fired heartbeat event should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Write a `Heartbeat` and reschedule.
    Probe,
    /// Traffic went out recently; just reschedule.
    Skip,
    /// Handshake still pending; write `Connect` again and reschedule.
    RetryConnect,
    /// Connection is winding down; let the event lapse.
    Stop,
}

/// Decide what a fired heartbeat event does for `connection`.
pub fn on_heartbeat_due(
    connection: &Connection,
    now: Instant,
    config: &TransportConfig,
) -> HeartbeatAction {
    match connection.state() {
        // Accepted connections start out Connected, so only clients get here.
        ConnectionState::Connecting => HeartbeatAction::RetryConnect,
        ConnectionState::Connected => {
            if connection
                .liveness()
                .needs_probe(now, config.heartbeat_interval)
            {
                HeartbeatAction::Probe
            } else {
                HeartbeatAction::Skip
            }
        }
        ConnectionState::Disconnecting | ConnectionState::Disconnected => HeartbeatAction::Stop,
    }
}

/// Deadline a connection has run past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No inbound traffic for longer than the idle timeout.
    TimedOut,
    /// Handshake did not complete in time.
    HandshakeExpired,
    /// Local close grace period has elapsed.
    GraceElapsed,
}

/// Check one connection against its deadlines. `None` while all are met.
pub fn check(connection: &Connection, now: Instant, config: &TransportConfig) -> Option<Verdict> {
    let liveness = connection.liveness();
    match connection.state() {
        ConnectionState::Connecting
            if now.saturating_duration_since(connection.created_at())
                >= config.handshake_timeout =>
        {
            Some(Verdict::HandshakeExpired)
        }
        ConnectionState::Connected if liveness.is_timed_out(now, config.idle_timeout()) => {
            Some(Verdict::TimedOut)
        }
        ConnectionState::Disconnecting
            if connection.teardown_at().is_some_and(|deadline| now >= deadline) =>
        {
            Some(Verdict::GraceElapsed)
        }
        _ => None,
    }
}
