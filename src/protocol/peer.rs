//! Socket-free peer state machine.
//!
//! [`PeerCore`] owns the connection table and the delayed-event scheduler.
//! It never touches a socket or reads the clock: datagrams and `Instant`s go
//! in, [`Transmit`]s and [`PeerEvent`]s come out. The socket-driven
//! `Server` and `Client` wrap it; tests drive it directly with a synthetic
//! clock.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;

use tracing::{debug, trace, warn};

use super::connection::{Connection, ConnectionId, ConnectionState, SequenceCheck};
use super::frame::{self, DeliveryMode, HeaderType, Message};
use super::heartbeat::{self, HeartbeatAction, Verdict};
use super::reliability::ResendOutcome;
use super::scheduler::{DelayedEvent, Scheduler};
use crate::core::constants::FIRST_CONNECTION_ID;
use crate::core::{
    ConfigError, DisconnectReason, ErrorCode, TransportConfig, TransportError, TransportResult,
};

/// Which side of the handshake this peer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepts `Connect` from any endpoint.
    Server,
    /// Initiates a single connection.
    Client,
}

/// Why a server refused a handshake. Carried as the first `Reject` payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RejectReason {
    /// Connection limit reached.
    ServerFull = 0x00,
    /// The endpoint's previous connection is still closing.
    AlreadyConnected = 0x01,
    /// Refused for another reason.
    Rejected = 0x02,
}

impl RejectReason {
    /// Parse a reject reason byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::ServerFull),
            0x01 => Some(Self::AlreadyConnected),
            0x02 => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A datagram ready for the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    /// Remote endpoint.
    pub destination: SocketAddr,
    /// Encoded datagram.
    pub contents: Vec<u8>,
}

/// Events surfaced to the layer above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Handshake completed.
    Connected {
        /// Local id of the connection.
        connection: ConnectionId,
        /// Remote endpoint.
        remote: SocketAddr,
    },

    /// A payload arrived.
    DataReceived {
        /// Connection it arrived on.
        connection: ConnectionId,
        /// Delivery mode it was sent with.
        mode: DeliveryMode,
        /// Payload bytes.
        payload: Vec<u8>,
    },

    /// The connection is gone.
    Disconnected {
        /// Local id of the connection.
        connection: ConnectionId,
        /// Why it ended.
        reason: DisconnectReason,
    },

    /// Roster: another client joined the server (clients only).
    ClientJoined {
        /// Server-assigned id of the other client.
        id: u16,
    },

    /// Roster: another client left the server (clients only).
    ClientLeft {
        /// Server-assigned id of the other client.
        id: u16,
    },
}

/// Id a client uses locally for its single connection.
pub const CLIENT_CONNECTION_ID: ConnectionId = ConnectionId::new(0);

/// Peer state machine for one socket.
#[derive(Debug)]
pub struct PeerCore {
    role: Role,
    config: TransportConfig,

    connections: HashMap<SocketAddr, Connection>,
    by_id: HashMap<ConnectionId, SocketAddr>,
    scheduler: Scheduler,

    outbound: VecDeque<Transmit>,
    events: VecDeque<PeerEvent>,

    next_id: u16,
    /// Server-assigned id (clients only, after Welcome).
    local_id: Option<u16>,
    /// Reason from the last Reject (clients only).
    reject_reason: Option<RejectReason>,
}

impl PeerCore {
    /// Create a peer with the given role.
    pub fn new(role: Role, config: TransportConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            role,
            config,
            connections: HashMap::new(),
            by_id: HashMap::new(),
            scheduler: Scheduler::new(),
            outbound: VecDeque::new(),
            events: VecDeque::new(),
            next_id: FIRST_CONNECTION_ID,
            local_id: None,
            reject_reason: None,
        })
    }

    /// Create a server-role peer.
    pub fn server(config: TransportConfig) -> Result<Self, ConfigError> {
        Self::new(Role::Server, config)
    }

    /// Create a client-role peer.
    pub fn client(config: TransportConfig) -> Result<Self, ConfigError> {
        Self::new(Role::Client, config)
    }

    // =========================================================================
    // Downward API
    // =========================================================================

    /// Begin a handshake with `remote` (clients only).
    pub fn connect(&mut self, remote: SocketAddr, now: Instant) -> TransportResult<ConnectionId> {
        if self.role != Role::Client {
            return Err(TransportError::InvalidSend(
                "servers accept connections, they do not initiate them".into(),
            ));
        }
        if !self.connections.is_empty() {
            return Err(TransportError::InvalidSend(
                "client already has a connection".into(),
            ));
        }

        let id = CLIENT_CONNECTION_ID;
        let mut connection = Connection::outgoing(id, remote, now);
        connection.on_datagram_sent(now);
        self.connections.insert(remote, connection);
        self.by_id.insert(id, remote);
        self.local_id = None;
        self.reject_reason = None;

        self.queue(remote, frame::encode_control(HeaderType::Connect));
        self.scheduler.schedule_after(
            DelayedEvent::Heartbeat { connection: id },
            now,
            self.config.heartbeat_interval,
        );

        debug!(remote = %remote, "connecting");
        Ok(id)
    }

    /// Send a payload on a connection.
    ///
    /// Returns the sequence assigned to Reliable and Notify sends.
    pub fn send(
        &mut self,
        id: ConnectionId,
        payload: &[u8],
        mode: DeliveryMode,
        now: Instant,
    ) -> TransportResult<Option<u64>> {
        if payload.len() > self.config.max_payload_size {
            return Err(TransportError::InvalidSend(format!(
                "payload of {} bytes exceeds limit of {}",
                payload.len(),
                self.config.max_payload_size
            )));
        }
        if self.outbound.len() >= self.config.outbound_queue_capacity {
            return Err(TransportError::Congestion);
        }

        let remote = *self
            .by_id
            .get(&id)
            .ok_or(TransportError::ConnectionClosed)?;
        let connection = self
            .connections
            .get_mut(&remote)
            .ok_or(TransportError::ConnectionClosed)?;
        if !connection.is_connected() {
            return Err(TransportError::ConnectionClosed);
        }

        if !mode.is_acknowledged() {
            let contents = frame::encode(HeaderType::Unreliable, None, payload)
                .map_err(|e| TransportError::InvalidSend(e.to_string()))?;
            connection.on_datagram_sent(now);
            self.outbound.push_back(Transmit {
                destination: remote,
                contents,
            });
            return Ok(None);
        }

        let sequence = connection.peek_sequence();
        if !connection.reliability().can_send(sequence) {
            return Err(TransportError::Congestion);
        }
        let contents = frame::encode(mode.header(), Some(sequence as u16), payload)
            .map_err(|e| TransportError::InvalidSend(e.to_string()))?;
        connection.next_sequence();

        let version = connection
            .reliability_mut()
            .register(sequence, contents.clone(), now);
        connection.on_datagram_sent(now);
        self.outbound.push_back(Transmit {
            destination: remote,
            contents,
        });
        self.scheduler.schedule_after(
            DelayedEvent::Resend {
                connection: id,
                sequence,
                version,
            },
            now,
            self.config.retry_interval,
        );

        trace!(connection = %id, sequence, ?mode, "sent");
        Ok(Some(sequence))
    }

    /// Send a payload to every connected remote. Returns how many accepted it.
    pub fn send_to_all(&mut self, payload: &[u8], mode: DeliveryMode, now: Instant) -> usize {
        let ids: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.is_connected())
            .map(Connection::id)
            .collect();

        let mut sent = 0;
        for id in ids {
            match self.send(id, payload, mode, now) {
                Ok(_) => sent += 1,
                Err(e) => debug!(connection = %id, error = %e, "broadcast send failed"),
            }
        }
        sent
    }

    /// Close a connection: send `Disconnect`, tear down after the grace period.
    pub fn close(&mut self, id: ConnectionId, now: Instant) -> TransportResult<()> {
        let remote = *self
            .by_id
            .get(&id)
            .ok_or(TransportError::ConnectionClosed)?;
        let state = self
            .connections
            .get(&remote)
            .map(Connection::state)
            .ok_or(TransportError::ConnectionClosed)?;

        match state {
            ConnectionState::Connected => {
                self.queue(remote, frame::encode_control(HeaderType::Disconnect));
                let deadline = now + self.config.disconnect_grace;
                if let Some(connection) = self.connections.get_mut(&remote) {
                    connection.on_datagram_sent(now);
                    connection.begin_disconnect(deadline);
                }
                self.scheduler.cancel_connection(id);
                debug!(connection = %id, remote = %remote, "closing");
            }
            ConnectionState::Connecting => {
                self.queue(remote, frame::encode_control(HeaderType::Disconnect));
                self.teardown(remote, ErrorCode::ConnectionClosed);
            }
            ConnectionState::Disconnecting | ConnectionState::Disconnected => {}
        }
        Ok(())
    }

    /// Drop every connection at once.
    ///
    /// Queued datagrams and pending resends are discarded. One best-effort
    /// `Disconnect` is queued per live remote and a `Disconnected` event is
    /// emitted per connection.
    pub fn shutdown(&mut self) {
        self.outbound.clear();
        self.scheduler.clear();

        let mut connections: Vec<Connection> =
            self.connections.drain().map(|(_, c)| c).collect();
        connections.sort_by_key(Connection::id);
        self.by_id.clear();

        for mut connection in connections {
            if connection.state() < ConnectionState::Disconnecting {
                self.outbound.push_back(Transmit {
                    destination: connection.remote(),
                    contents: frame::encode_control(HeaderType::Disconnect),
                });
            }
            connection.mark_disconnected();
            self.events.push_back(PeerEvent::Disconnected {
                connection: connection.id(),
                reason: ErrorCode::ConnectionClosed,
            });
        }
        debug!(role = ?self.role, "shut down");
    }

    // =========================================================================
    // Poll steps
    // =========================================================================

    /// Run one poll cycle: due events, then inbound datagrams, then the
    /// liveness sweep.
    ///
    /// Malformed datagrams are dropped; they never interrupt the cycle.
    pub fn poll<'a, I>(&mut self, now: Instant, inbound: I)
    where
        I: IntoIterator<Item = (SocketAddr, &'a [u8])>,
    {
        self.drain_due(now);
        for (from, datagram) in inbound {
            if let Err(e) = self.handle_datagram(from, datagram, now) {
                debug!(remote = %from, error = %e, "dropped datagram");
            }
        }
        self.check_liveness(now);
    }

    /// Invoke every scheduled event due at `now`.
    pub fn drain_due(&mut self, now: Instant) {
        while let Some(event) = self.scheduler.pop_due(now) {
            self.invoke(event, now);
        }
    }

    /// Process one inbound datagram.
    pub fn handle_datagram(
        &mut self,
        from: SocketAddr,
        datagram: &[u8],
        now: Instant,
    ) -> TransportResult<()> {
        let message = frame::decode(datagram)?;
        trace!(remote = %from, header = ?message.header, len = datagram.len(), "received");

        let Some(connection) = self.connections.get_mut(&from) else {
            if self.role == Role::Server && message.header == HeaderType::Connect {
                self.accept(from, now);
            } else {
                trace!(remote = %from, header = ?message.header, "ignoring unknown endpoint");
            }
            return Ok(());
        };
        connection.on_datagram_received(now);

        match message.header {
            HeaderType::Connect => self.on_connect(from, now),
            HeaderType::Welcome => self.on_welcome(from, message.payload),
            HeaderType::Reject => self.on_reject(from, message.payload),
            HeaderType::Heartbeat => {}
            HeaderType::Disconnect => self.teardown(from, ErrorCode::ConnectionClosed),
            HeaderType::Unreliable => self.on_unreliable(from, message.payload),
            HeaderType::Reliable | HeaderType::Notify => self.on_sequenced(from, message, now),
            HeaderType::Ack => self.on_ack(from, message, now),
            HeaderType::ClientConnected | HeaderType::ClientDisconnected => {
                self.on_roster(from, message)
            }
        }
        Ok(())
    }

    /// Apply idle, handshake and grace-period deadlines.
    pub fn check_liveness(&mut self, now: Instant) {
        let expired: Vec<(SocketAddr, Verdict)> = self
            .connections
            .iter()
            .filter_map(|(remote, connection)| {
                heartbeat::check(connection, now, &self.config).map(|verdict| (*remote, verdict))
            })
            .collect();

        for (remote, verdict) in expired {
            let reason = match verdict {
                Verdict::TimedOut | Verdict::HandshakeExpired => ErrorCode::Timeout,
                Verdict::GraceElapsed => ErrorCode::ConnectionClosed,
            };
            self.teardown(remote, reason);
        }
    }

    /// Force the connection to `remote` down after a socket fault.
    pub fn on_socket_error(&mut self, remote: SocketAddr) {
        if self.connections.contains_key(&remote) {
            self.teardown(remote, ErrorCode::Unexpected);
        }
    }

    /// Next datagram to write.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.outbound.pop_front()
    }

    /// Next event for the layer above.
    pub fn poll_event(&mut self) -> Option<PeerEvent> {
        self.events.pop_front()
    }

    /// Take every pending event.
    pub fn drain_events(&mut self) -> Vec<PeerEvent> {
        self.events.drain(..).collect()
    }

    /// Earliest scheduled deadline.
    pub fn next_timeout(&self) -> Option<Instant> {
        self.scheduler.next_fire_time()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Peer role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Active configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Look up a connection by id.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.by_id
            .get(&id)
            .and_then(|remote| self.connections.get(remote))
    }

    /// Look up a connection by remote endpoint.
    pub fn connection_by_addr(&self, remote: SocketAddr) -> Option<&Connection> {
        self.connections.get(&remote)
    }

    /// Iterate over all connections.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Number of connections in the table.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Server-assigned id (clients only, once connected).
    pub fn local_id(&self) -> Option<u16> {
        self.local_id
    }

    /// Reason given by the last `Reject` (clients only).
    pub fn reject_reason(&self) -> Option<RejectReason> {
        self.reject_reason
    }

    /// Datagrams waiting for the socket.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Events waiting in the scheduler.
    pub fn scheduled_len(&self) -> usize {
        self.scheduler.len()
    }

    // =========================================================================
    // Inbound handlers
    // =========================================================================

    fn accept(&mut self, from: SocketAddr, now: Instant) {
        if self.connections.len() >= self.config.max_connections {
            debug!(remote = %from, "rejecting connection: server full");
            self.reject(from, RejectReason::ServerFull);
            return;
        }
        let Some(id) = self.allocate_id() else {
            warn!(remote = %from, "rejecting connection: no free ids");
            self.reject(from, RejectReason::Rejected);
            return;
        };

        let mut connection = Connection::incoming(id, from, now);
        connection.on_datagram_received(now);
        self.queue(from, frame::encode_with_id(HeaderType::Welcome, id.get()));
        connection.on_datagram_sent(now);
        connection.advance(ConnectionState::Connected);

        // Roster: tell the newcomer about everyone, and everyone about the newcomer.
        let others: Vec<(SocketAddr, ConnectionId)> = self
            .connections
            .values()
            .filter(|c| c.is_connected())
            .map(|c| (c.remote(), c.id()))
            .collect();
        for (remote, other) in others {
            self.queue(
                from,
                frame::encode_with_id(HeaderType::ClientConnected, other.get()),
            );
            self.queue(
                remote,
                frame::encode_with_id(HeaderType::ClientConnected, id.get()),
            );
        }

        self.connections.insert(from, connection);
        self.by_id.insert(id, from);
        self.scheduler.schedule_after(
            DelayedEvent::Heartbeat { connection: id },
            now,
            self.config.heartbeat_interval,
        );

        debug!(connection = %id, remote = %from, "accepted connection");
        self.events.push_back(PeerEvent::Connected {
            connection: id,
            remote: from,
        });
    }

    fn reject(&mut self, to: SocketAddr, reason: RejectReason) {
        let contents = vec![HeaderType::Reject.as_byte(), reason.as_byte()];
        self.queue(to, contents);
    }

    fn on_connect(&mut self, from: SocketAddr, now: Instant) {
        if self.role != Role::Server {
            return;
        }
        let Some(connection) = self.connections.get_mut(&from) else {
            return;
        };
        match connection.state() {
            ConnectionState::Connected => {
                // The remote never saw our Welcome.
                let id = connection.id();
                connection.on_datagram_sent(now);
                self.queue(from, frame::encode_with_id(HeaderType::Welcome, id.get()));
                trace!(connection = %id, "re-sent welcome");
            }
            ConnectionState::Disconnecting => {
                debug!(remote = %from, "rejecting connection: previous connection still closing");
                self.reject(from, RejectReason::AlreadyConnected);
            }
            ConnectionState::Connecting | ConnectionState::Disconnected => {}
        }
    }

    fn on_welcome(&mut self, from: SocketAddr, payload: &[u8]) {
        let Some(connection) = self.connections.get_mut(&from) else {
            return;
        };
        if !connection.is_outgoing() || !connection.advance(ConnectionState::Connected) {
            return;
        }
        let id = connection.id();
        self.local_id = frame::read_id(payload);

        debug!(remote = %from, local_id = ?self.local_id, "connected");
        self.events.push_back(PeerEvent::Connected {
            connection: id,
            remote: from,
        });
    }

    fn on_reject(&mut self, from: SocketAddr, payload: &[u8]) {
        let connecting = self
            .connections
            .get(&from)
            .is_some_and(|c| c.is_outgoing() && c.state() == ConnectionState::Connecting);
        if !connecting {
            return;
        }
        self.reject_reason = payload.first().copied().and_then(RejectReason::from_byte);
        debug!(remote = %from, reason = ?self.reject_reason, "connection rejected");
        self.teardown(from, ErrorCode::Refused);
    }

    fn on_unreliable(&mut self, from: SocketAddr, payload: &[u8]) {
        let Some(connection) = self.connections.get(&from) else {
            return;
        };
        if !connection.is_connected() {
            return;
        }
        self.events.push_back(PeerEvent::DataReceived {
            connection: connection.id(),
            mode: DeliveryMode::Unreliable,
            payload: payload.to_vec(),
        });
    }

    fn on_sequenced(&mut self, from: SocketAddr, message: Message<'_>, now: Instant) {
        let (Some(connection), Some(wire)) = (self.connections.get_mut(&from), message.sequence)
        else {
            return;
        };
        if !connection.is_connected() {
            return;
        }

        let check = connection.accept_sequence(wire);
        let id = connection.id();
        if let SequenceCheck::OutOfRange(sequence) = check {
            debug!(connection = %id, sequence, "dropping sequence outside the window");
            return;
        }

        // Ack every copy: the previous ack may have been lost.
        connection.on_datagram_sent(now);
        self.queue(from, frame::encode_ack(wire));

        match check {
            SequenceCheck::Fresh(sequence) => {
                let mode = DeliveryMode::from_header(message.header)
                    .unwrap_or(DeliveryMode::Reliable);
                trace!(connection = %id, sequence, ?mode, "delivered");
                self.events.push_back(PeerEvent::DataReceived {
                    connection: id,
                    mode,
                    payload: message.payload.to_vec(),
                });
            }
            SequenceCheck::Duplicate(sequence) => {
                trace!(connection = %id, sequence, "duplicate suppressed");
            }
            SequenceCheck::OutOfRange(_) => {}
        }
    }

    fn on_ack(&mut self, from: SocketAddr, message: Message<'_>, now: Instant) {
        let (Some(connection), Some(wire)) = (self.connections.get_mut(&from), message.sequence)
        else {
            return;
        };
        match connection.on_ack(wire, now) {
            Some(acked) => {
                trace!(
                    connection = %connection.id(),
                    sequence = acked.sequence,
                    rtt = ?acked.rtt_sample,
                    "acked"
                );
            }
            None => trace!(connection = %connection.id(), wire, "duplicate ack"),
        }
    }

    fn on_roster(&mut self, from: SocketAddr, message: Message<'_>) {
        if self.role != Role::Client {
            return;
        }
        let connected = self
            .connections
            .get(&from)
            .is_some_and(Connection::is_connected);
        let Some(id) = frame::read_id(message.payload) else {
            return;
        };
        if !connected {
            return;
        }
        let event = if message.header == HeaderType::ClientConnected {
            PeerEvent::ClientJoined { id }
        } else {
            PeerEvent::ClientLeft { id }
        };
        self.events.push_back(event);
    }

    // =========================================================================
    // Scheduled events
    // =========================================================================

    fn invoke(&mut self, event: DelayedEvent, now: Instant) {
        match event {
            DelayedEvent::Resend {
                connection,
                sequence,
                version,
            } => self.on_resend_due(connection, sequence, version, now),
            DelayedEvent::Heartbeat { connection } => self.on_heartbeat_due(connection, now),
        }
    }

    fn on_resend_due(&mut self, id: ConnectionId, sequence: u64, version: u32, now: Instant) {
        let Some(&remote) = self.by_id.get(&id) else {
            return;
        };
        let max_retries = self.config.max_retries;
        let Some(connection) = self.connections.get_mut(&remote) else {
            return;
        };
        if !connection.is_connected() {
            return;
        }

        let resend = match connection
            .reliability_mut()
            .on_resend_due(sequence, version, now, max_retries)
        {
            ResendOutcome::Stale => return,
            ResendOutcome::Resend { bytes, version } => Some((bytes.to_vec(), version)),
            ResendOutcome::Exhausted => None,
        };

        match resend {
            Some((contents, version)) => {
                connection.on_resend();
                connection.on_datagram_sent(now);
                self.outbound.push_back(Transmit {
                    destination: remote,
                    contents,
                });
                self.scheduler.schedule_after(
                    DelayedEvent::Resend {
                        connection: id,
                        sequence,
                        version,
                    },
                    now,
                    self.config.retry_interval,
                );
                trace!(connection = %id, sequence, "resent");
            }
            None => {
                warn!(connection = %id, sequence, max_retries, "retry ceiling exceeded");
                self.teardown(remote, ErrorCode::Timeout);
            }
        }
    }

    fn on_heartbeat_due(&mut self, id: ConnectionId, now: Instant) {
        let Some(&remote) = self.by_id.get(&id) else {
            return;
        };
        let Some(connection) = self.connections.get_mut(&remote) else {
            return;
        };

        let header = match heartbeat::on_heartbeat_due(connection, now, &self.config) {
            HeartbeatAction::Stop => return,
            HeartbeatAction::Skip => None,
            HeartbeatAction::Probe => Some(HeaderType::Heartbeat),
            HeartbeatAction::RetryConnect => Some(HeaderType::Connect),
        };
        if let Some(header) = header {
            connection.on_datagram_sent(now);
            self.outbound.push_back(Transmit {
                destination: remote,
                contents: frame::encode_control(header),
            });
        }

        self.scheduler.schedule_after(
            DelayedEvent::Heartbeat { connection: id },
            now,
            self.config.heartbeat_interval,
        );
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn queue(&mut self, destination: SocketAddr, contents: Vec<u8>) {
        self.outbound.push_back(Transmit {
            destination,
            contents,
        });
    }

    fn allocate_id(&mut self) -> Option<ConnectionId> {
        for _ in 0..u16::MAX {
            let candidate = ConnectionId::new(self.next_id);
            self.next_id = self.next_id.checked_add(1).unwrap_or(FIRST_CONNECTION_ID);
            if !self.by_id.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Remove a connection and announce it.
    fn teardown(&mut self, remote: SocketAddr, reason: DisconnectReason) {
        let Some(mut connection) = self.connections.remove(&remote) else {
            return;
        };
        let id = connection.id();
        let was_announced = matches!(
            connection.state(),
            ConnectionState::Connected | ConnectionState::Disconnecting
        );
        self.by_id.remove(&id);
        self.scheduler.cancel_connection(id);
        connection.mark_disconnected();

        match reason {
            ErrorCode::Timeout | ErrorCode::Unexpected => {
                warn!(connection = %id, remote = %remote, %reason, "connection lost")
            }
            _ => debug!(connection = %id, remote = %remote, %reason, "disconnected"),
        }

        if self.role == Role::Server && was_announced {
            let peers: Vec<SocketAddr> = self
                .connections
                .values()
                .filter(|c| c.is_connected())
                .map(Connection::remote)
                .collect();
            for peer in peers {
                self.queue(
                    peer,
                    frame::encode_with_id(HeaderType::ClientDisconnected, id.get()),
                );
            }
        }

        self.events.push_back(PeerEvent::Disconnected {
            connection: id,
            reason,
        });
    }
}
