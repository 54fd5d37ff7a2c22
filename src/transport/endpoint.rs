//! Glue between [`PeerCore`] and [`PeerSocket`].
//!
//! `Server` and `Client` are thin role-specific façades over this type.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::handle::{Command, SendHandle};
use super::socket::{Inbound, PeerSocket};
use crate::core::{TransportConfig, TransportError, TransportResult};
use crate::protocol::{ConnectionId, DeliveryMode, PeerCore, PeerEvent, Role};

/// A bound socket driving a peer state machine.
#[derive(Debug)]
pub(crate) struct Endpoint {
    core: PeerCore,
    socket: PeerSocket,
    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
}

impl Endpoint {
    pub(crate) async fn bind(
        addr: SocketAddr,
        role: Role,
        config: TransportConfig,
    ) -> TransportResult<Self> {
        let core = PeerCore::new(role, config)?;
        let socket = PeerSocket::bind(addr, core.config()).await?;
        let (commands_tx, commands_rx) = mpsc::channel(core.config().outbound_queue_capacity);
        Ok(Self {
            core,
            socket,
            commands_tx,
            commands_rx,
        })
    }

    pub(crate) fn core(&self) -> &PeerCore {
        &self.core
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    pub(crate) fn handle(&self, connection: Option<ConnectionId>) -> SendHandle {
        SendHandle::new(self.commands_tx.clone(), connection)
    }

    pub(crate) fn connect(&mut self, remote: SocketAddr) -> TransportResult<ConnectionId> {
        let id = self.core.connect(remote, Instant::now())?;
        self.flush();
        Ok(id)
    }

    /// One tick: queued commands, due events, inbound datagrams, liveness,
    /// then flush. Returns the events produced.
    pub(crate) fn poll(&mut self) -> Vec<PeerEvent> {
        if self.socket.is_closed() {
            return self.core.drain_events();
        }
        let now = Instant::now();

        self.apply_commands(now);
        self.core.drain_due(now);
        while let Some(item) = self.socket.try_recv() {
            match item {
                Inbound::Datagram { from, contents } => {
                    if let Err(e) = self.core.handle_datagram(from, &contents, now) {
                        warn!(remote = %from, error = %e, "dropping invalid datagram");
                    }
                }
                Inbound::SendFailed { destination, error } => {
                    debug!(remote = %destination, error = %error, "write failure reported");
                    self.core.on_socket_error(destination);
                }
            }
        }
        self.core.check_liveness(now);
        self.flush();

        self.core.drain_events()
    }

    pub(crate) fn send(
        &mut self,
        connection: ConnectionId,
        payload: &[u8],
        mode: DeliveryMode,
    ) -> TransportResult<Option<u64>> {
        if self.socket.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        if self.socket.send_capacity() == 0 {
            return Err(TransportError::Congestion);
        }
        let sequence = self.core.send(connection, payload, mode, Instant::now())?;
        self.flush();
        Ok(sequence)
    }

    pub(crate) fn send_to_all(&mut self, payload: &[u8], mode: DeliveryMode) -> usize {
        if self.socket.is_closed() {
            return 0;
        }
        let sent = self.core.send_to_all(payload, mode, Instant::now());
        self.flush();
        sent
    }

    pub(crate) fn close(&mut self, connection: ConnectionId) -> TransportResult<()> {
        self.core.close(connection, Instant::now())?;
        self.flush();
        Ok(())
    }

    /// Drop every connection and release the socket.
    pub(crate) fn shutdown(&mut self) -> Vec<PeerEvent> {
        if !self.socket.is_closed() {
            self.core.shutdown();
            self.flush();
            self.socket.close();
            self.commands_rx.close();
        }
        self.core.drain_events()
    }

    fn apply_commands(&mut self, now: Instant) {
        while let Ok(command) = self.commands_rx.try_recv() {
            let result = match command {
                Command::Send {
                    connection,
                    payload,
                    mode,
                } => self
                    .core
                    .send(connection, &payload, mode, now)
                    .map(|_| ()),
                Command::Close { connection } => self.core.close(connection, now),
            };
            if let Err(e) = result {
                debug!(error = %e, "queued command failed");
            }
        }
    }

    fn flush(&mut self) {
        while let Some(transmit) = self.core.poll_transmit() {
            let destination = transmit.destination;
            if let Err(e) = self.socket.try_send(transmit) {
                // Treated as loss; acknowledged sends are retried by the scheduler.
                trace!(remote = %destination, error = %e, "datagram dropped before write");
            }
        }
    }
}
