//! Echo server.

use std::time::Duration;

use reliant::prelude::*;
use tracing::{info, warn};

use crate::settings::Settings;

/// Poll interval.
const TICK: Duration = Duration::from_millis(10);

/// Serve until Ctrl-C.
pub async fn run(settings: &Settings) -> Result<(), TransportError> {
    let mut server = Server::bind(settings.bind_addr, TransportConfig::default()).await?;
    info!(local = %server.local_addr(), "echo server ready");

    let mut ticker = tokio::time::interval(TICK);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        for event in server.poll() {
            match event {
                PeerEvent::Connected { connection, remote } => {
                    info!(%connection, %remote, "client connected");
                }
                PeerEvent::DataReceived {
                    connection,
                    mode,
                    payload,
                } => {
                    if let Err(e) = server.send(connection, &payload, mode) {
                        warn!(%connection, error = %e, "echo failed");
                    }
                }
                PeerEvent::Disconnected { connection, reason } => {
                    info!(%connection, %reason, "client disconnected");
                }
                PeerEvent::ClientJoined { .. } | PeerEvent::ClientLeft { .. } => {}
            }
        }
    }

    for event in server.shutdown() {
        info!(?event, "shutdown");
    }
    Ok(())
}
