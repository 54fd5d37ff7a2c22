//! High-level Reliant server API.
//!
//! Provides [`Server`], which accepts connections from any number of
//! clients (up to `max_connections`) over one UDP socket.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tracing::info;

use crate::core::{TransportConfig, TransportResult};
use crate::protocol::{Connection, ConnectionId, DeliveryMode, PeerEvent, Role};
use crate::transport::{Endpoint, SendHandle};

/// A Reliant server.
///
/// # Example
///
/// ```no_run
/// use reliant::prelude::*;
///
/// # async fn run() -> Result<(), TransportError> {
/// let mut server = Server::start(7777, TransportConfig::default()).await?;
///
/// loop {
///     for event in server.poll() {
///         if let PeerEvent::DataReceived { connection, mode, payload } = event {
///             server.send(connection, &payload, mode)?;
///         }
///     }
///     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct Server {
    endpoint: Endpoint,
}

impl Server {
    /// Listen on every interface at `port`. Port 0 picks an ephemeral port.
    pub async fn start(port: u16, config: TransportConfig) -> TransportResult<Self> {
        Self::start_on(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port, config).await
    }

    /// Listen on `address:port`.
    pub async fn start_on(
        address: IpAddr,
        port: u16,
        config: TransportConfig,
    ) -> TransportResult<Self> {
        Self::bind(SocketAddr::new(address, port), config).await
    }

    /// Listen on `addr`.
    ///
    /// Bind failures are returned here and the server never starts.
    pub async fn bind(addr: SocketAddr, config: TransportConfig) -> TransportResult<Self> {
        let endpoint = Endpoint::bind(addr, Role::Server, config).await?;
        info!(local = %endpoint.local_addr(), "server listening");
        Ok(Self { endpoint })
    }

    /// Run one tick and return what happened.
    pub fn poll(&mut self) -> Vec<PeerEvent> {
        self.endpoint.poll()
    }

    /// Send to one client. Returns the sequence for acknowledged modes.
    pub fn send(
        &mut self,
        connection: ConnectionId,
        payload: &[u8],
        mode: DeliveryMode,
    ) -> TransportResult<Option<u64>> {
        self.endpoint.send(connection, payload, mode)
    }

    /// Send to every connected client. Returns how many accepted it.
    pub fn send_to_all(&mut self, payload: &[u8], mode: DeliveryMode) -> usize {
        self.endpoint.send_to_all(payload, mode)
    }

    /// Close one client connection.
    pub fn close(&mut self, connection: ConnectionId) -> TransportResult<()> {
        self.endpoint.close(connection)
    }

    /// Drop every client and release the socket.
    ///
    /// Returns the final `Disconnected` events.
    pub fn shutdown(&mut self) -> Vec<PeerEvent> {
        info!(local = %self.endpoint.local_addr(), "server shutting down");
        self.endpoint.shutdown()
    }

    /// Handle for queueing sends from other threads.
    pub fn handle(&self) -> SendHandle {
        self.endpoint.handle(None)
    }

    /// Handle bound to one client.
    pub fn handle_for(&self, connection: ConnectionId) -> SendHandle {
        self.endpoint.handle(Some(connection))
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    /// Number of connections in the table.
    pub fn connection_count(&self) -> usize {
        self.endpoint.core().connection_count()
    }

    /// Look up a connection.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.endpoint.core().connection(id)
    }

    /// Active configuration.
    pub fn config(&self) -> &TransportConfig {
        self.endpoint.core().config()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.endpoint.shutdown();
    }
}
