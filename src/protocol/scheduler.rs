//! Delayed-event scheduler.
//!
//! One time-ordered queue holds every resend and heartbeat deadline for a
//! peer. The poll loop drains it; nothing here owns a thread or a timer.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use super::connection::ConnectionId;

/// Work to perform once a deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayedEvent {
    /// Resend a pending message unless it changed since scheduling.
    Resend {
        /// Owning connection.
        connection: ConnectionId,
        /// Full sequence of the pending message.
        sequence: u64,
        /// Send version observed when the event was scheduled.
        version: u32,
    },
    /// Probe liveness (or retry the handshake while connecting).
    Heartbeat {
        /// Target connection.
        connection: ConnectionId,
    },
}

impl DelayedEvent {
    /// Connection the event belongs to.
    pub fn connection(&self) -> ConnectionId {
        match self {
            DelayedEvent::Resend { connection, .. } | DelayedEvent::Heartbeat { connection } => {
                *connection
            }
        }
    }
}

#[derive(Debug)]
struct Entry {
    fire_at: Instant,
    /// Insertion order, breaks ties between equal deadlines.
    order: u64,
    event: DelayedEvent,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.order == other.order
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_at
            .cmp(&other.fire_at)
            .then(self.order.cmp(&other.order))
    }
}

/// Min-heap of delayed events keyed by fire time.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Entry>>,
    next_order: u64,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event at an absolute time.
    pub fn schedule(&mut self, event: DelayedEvent, fire_at: Instant) {
        let order = self.next_order;
        self.next_order = self.next_order.wrapping_add(1);
        self.queue.push(Reverse(Entry {
            fire_at,
            order,
            event,
        }));
    }

    /// Schedule an event `delay` after `now`.
    pub fn schedule_after(&mut self, event: DelayedEvent, now: Instant, delay: Duration) {
        self.schedule(event, now + delay);
    }

    /// Pop the earliest event if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<DelayedEvent> {
        if self.queue.peek()?.0.fire_at > now {
            return None;
        }
        self.queue.pop().map(|Reverse(entry)| entry.event)
    }

    /// Remove every event due at `now`, in fire-time order.
    pub fn drain_due(&mut self, now: Instant) -> Vec<DelayedEvent> {
        let mut due = Vec::new();
        while let Some(event) = self.pop_due(now) {
            due.push(event);
        }
        due
    }

    /// Earliest scheduled fire time.
    pub fn next_fire_time(&self) -> Option<Instant> {
        self.queue.peek().map(|Reverse(entry)| entry.fire_at)
    }

    /// Drop every event belonging to a connection.
    pub fn cancel_connection(&mut self, connection: ConnectionId) {
        self.queue
            .retain(|Reverse(entry)| entry.event.connection() != connection);
    }

    /// Number of scheduled events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop all events.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat(id: u16) -> DelayedEvent {
        DelayedEvent::Heartbeat {
            connection: ConnectionId::new(id),
        }
    }

    #[test]
    fn test_drains_in_time_order() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new();

        scheduler.schedule_after(heartbeat(3), now, Duration::from_millis(30));
        scheduler.schedule_after(heartbeat(1), now, Duration::from_millis(10));
        scheduler.schedule_after(heartbeat(2), now, Duration::from_millis(20));

        let due = scheduler.drain_due(now + Duration::from_millis(25));
        assert_eq!(due, vec![heartbeat(1), heartbeat(2)]);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(
            scheduler.next_fire_time(),
            Some(now + Duration::from_millis(30))
        );
    }

    #[test]
    fn test_equal_deadlines_keep_insertion_order() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new();

        for id in 1..=4 {
            scheduler.schedule(heartbeat(id), now);
        }

        let due = scheduler.drain_due(now);
        assert_eq!(
            due,
            vec![heartbeat(1), heartbeat(2), heartbeat(3), heartbeat(4)]
        );
    }

    #[test]
    fn test_nothing_due_yet() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(heartbeat(1), now, Duration::from_secs(1));

        assert!(scheduler.pop_due(now).is_none());
        assert!(scheduler.drain_due(now).is_empty());
        assert!(!scheduler.is_empty());
    }

    #[test]
    fn test_cancel_connection() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(heartbeat(1), now);
        scheduler.schedule(
            DelayedEvent::Resend {
                connection: ConnectionId::new(1),
                sequence: 5,
                version: 1,
            },
            now,
        );
        scheduler.schedule(heartbeat(2), now);

        scheduler.cancel_connection(ConnectionId::new(1));
        assert_eq!(scheduler.drain_due(now), vec![heartbeat(2)]);
    }
}
