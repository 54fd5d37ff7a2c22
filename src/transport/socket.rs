//! Async UDP driver for a peer.
//!
//! Two background tasks own the socket. The reader only copies datagrams into
//! a bounded queue; the writer only drains a bounded queue onto the wire and
//! reports failed writes back through the inbound queue. Nothing here touches
//! connection state, so the poll loop stays the single writer.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::core::{TransportConfig, TransportError, TransportResult};
use crate::protocol::Transmit;

/// An item produced by the background tasks.
#[derive(Debug)]
pub enum Inbound {
    /// A datagram read from the socket.
    Datagram {
        /// Sender endpoint.
        from: SocketAddr,
        /// Raw bytes.
        contents: Vec<u8>,
    },
    /// A write to `destination` failed.
    SendFailed {
        /// Endpoint the write was addressed to.
        destination: SocketAddr,
        /// Underlying error.
        error: io::Error,
    },
}

/// UDP socket with a background reader and writer.
#[derive(Debug)]
pub struct PeerSocket {
    local_addr: SocketAddr,
    inbound_rx: mpsc::Receiver<Inbound>,
    /// `None` once closed; dropping it lets the writer drain and exit.
    outbound_tx: Option<mpsc::Sender<Transmit>>,
    reader: JoinHandle<()>,
}

impl PeerSocket {
    /// Bind to `addr` and spawn the background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bind(addr: SocketAddr, config: &TransportConfig) -> TransportResult<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Self::from_socket(socket, config)
    }

    /// Wrap an already bound socket.
    pub fn from_socket(socket: UdpSocket, config: &TransportConfig) -> TransportResult<Self> {
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_queue_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue_capacity);

        let reader = tokio::spawn(read_loop(
            Arc::clone(&socket),
            inbound_tx.clone(),
            config.recv_buffer_size,
        ));
        tokio::spawn(write_loop(socket, outbound_rx, inbound_tx));

        debug!(local = %local_addr, "socket bound");
        Ok(Self {
            local_addr,
            inbound_rx,
            outbound_tx: Some(outbound_tx),
            reader,
        })
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Hand a datagram to the writer without waiting.
    pub fn try_send(&self, transmit: Transmit) -> TransportResult<()> {
        let tx = self
            .outbound_tx
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?;
        tx.try_send(transmit).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Congestion,
            TrySendError::Closed(_) => TransportError::ConnectionClosed,
        })
    }

    /// Free slots in the writer queue.
    pub fn send_capacity(&self) -> usize {
        self.outbound_tx.as_ref().map_or(0, |tx| tx.capacity())
    }

    /// Take the next queued item, if any.
    pub fn try_recv(&mut self) -> Option<Inbound> {
        match self.inbound_rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Stop reading. Datagrams already handed to the writer are still sent.
    pub fn close(&mut self) {
        self.reader.abort();
        self.outbound_tx = None;
        self.inbound_rx.close();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.outbound_tx.is_none()
    }
}

impl Drop for PeerSocket {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(socket: Arc<UdpSocket>, tx: mpsc::Sender<Inbound>, buffer_size: usize) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                let item = Inbound::Datagram {
                    from,
                    contents: buf[..len].to_vec(),
                };
                match tx.try_send(item) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        trace!(remote = %from, len, "inbound queue full, dropping datagram")
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            // ICMP errors surface here on some platforms; the socket stays usable.
            Err(e) => debug!(error = %e, "receive failed"),
        }
    }
}

async fn write_loop(
    socket: Arc<UdpSocket>,
    mut rx: mpsc::Receiver<Transmit>,
    errors: mpsc::Sender<Inbound>,
) {
    while let Some(transmit) = rx.recv().await {
        if let Err(error) = socket.send_to(&transmit.contents, transmit.destination).await {
            warn!(remote = %transmit.destination, error = %error, "send failed");
            let report = Inbound::SendFailed {
                destination: transmit.destination,
                error,
            };
            if errors.send(report).await.is_err() {
                // Poll side is gone; keep flushing what is left.
                continue;
            }
        }
    }
}
