//! High-level Reliant client API.
//!
//! Provides [`Client`], a single outgoing connection to a Reliant server.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{debug, info};

use crate::core::{TransportConfig, TransportError, TransportResult};
use crate::protocol::{
    CLIENT_CONNECTION_ID, Connection, ConnectionId, ConnectionState, DeliveryMode, PeerEvent,
    RejectReason, Role,
};
use crate::transport::{Endpoint, SendHandle};

/// A Reliant client.
///
/// `connect` returns as soon as the handshake is under way; the
/// `Connected` event (or a `Disconnected` with `Refused`/`Timeout`) arrives
/// through [`poll`](Client::poll).
///
/// # Example
///
/// ```no_run
/// use reliant::prelude::*;
///
/// # async fn run() -> Result<(), TransportError> {
/// let mut client = Client::connect("localhost", 7777, TransportConfig::default()).await?;
///
/// loop {
///     for event in client.poll() {
///         match event {
///             PeerEvent::Connected { .. } => {
///                 client.send(b"hello", DeliveryMode::Reliable)?;
///             }
///             PeerEvent::Disconnected { reason, .. } => {
///                 return Err(TransportError::InvalidSend(format!("disconnected: {reason}")));
///             }
///             _ => {}
///         }
///     }
///     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct Client {
    endpoint: Endpoint,
    server_addr: SocketAddr,
}

impl Client {
    /// Resolve `host` and start a handshake with it.
    ///
    /// Resolution failures return `DnsResolve`; bind failures return `Io`.
    pub async fn connect(host: &str, port: u16, config: TransportConfig) -> TransportResult<Self> {
        let server_addr = resolve(host, port).await?;
        Self::connect_addr(server_addr, config).await
    }

    /// Start a handshake with an already resolved address.
    pub async fn connect_addr(
        server_addr: SocketAddr,
        config: TransportConfig,
    ) -> TransportResult<Self> {
        let local = match server_addr.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let mut endpoint = Endpoint::bind(local, Role::Client, config).await?;
        endpoint.connect(server_addr)?;

        info!(server = %server_addr, local = %endpoint.local_addr(), "client connecting");
        Ok(Self {
            endpoint,
            server_addr,
        })
    }

    /// Run one tick and return what happened.
    pub fn poll(&mut self) -> Vec<PeerEvent> {
        self.endpoint.poll()
    }

    /// Send to the server. Returns the sequence for acknowledged modes.
    pub fn send(&mut self, payload: &[u8], mode: DeliveryMode) -> TransportResult<Option<u64>> {
        self.endpoint.send(CLIENT_CONNECTION_ID, payload, mode)
    }

    /// Close the connection to the server.
    pub fn close(&mut self) -> TransportResult<()> {
        self.endpoint.close(CLIENT_CONNECTION_ID)
    }

    /// Drop the connection immediately and release the socket.
    pub fn shutdown(&mut self) -> Vec<PeerEvent> {
        debug!(server = %self.server_addr, "client shutting down");
        self.endpoint.shutdown()
    }

    /// Handle for queueing sends from other threads.
    pub fn handle(&self) -> SendHandle {
        self.endpoint.handle(Some(CLIENT_CONNECTION_ID))
    }

    /// Connection id used for the server connection in events.
    pub fn connection_id(&self) -> ConnectionId {
        CLIENT_CONNECTION_ID
    }

    /// Id the server assigned us, once connected.
    pub fn local_id(&self) -> Option<u16> {
        self.endpoint.core().local_id()
    }

    /// Why the server refused us, if it did.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        self.endpoint.core().reject_reason()
    }

    /// Current connection state; `Disconnected` once torn down.
    pub fn state(&self) -> ConnectionState {
        self.connection()
            .map_or(ConnectionState::Disconnected, Connection::state)
    }

    /// Whether the handshake has completed and the connection is live.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The server connection, while it exists.
    pub fn connection(&self) -> Option<&Connection> {
        self.endpoint.core().connection(CLIENT_CONNECTION_ID)
    }

    /// Server address.
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Local socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.endpoint.shutdown();
    }
}

async fn resolve(host: &str, port: u16) -> TransportResult<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| TransportError::DnsResolve(format!("{host}:{port}: {e}")))?;
    addrs
        .next()
        .ok_or_else(|| TransportError::DnsResolve(format!("{host}:{port}: no addresses")))
}
