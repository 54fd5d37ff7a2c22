//! Echo client: stdin lines out, echoes to stdout.

use std::time::Duration;

use reliant::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::settings::Settings;

/// Poll interval.
const TICK: Duration = Duration::from_millis(10);

/// Run until the connection ends.
pub async fn run(settings: &Settings) -> Result<(), TransportError> {
    let mut client = Client::connect(
        &settings.server_host,
        settings.server_port,
        TransportConfig::default(),
    )
    .await?;

    let handle = client.handle();
    let connection = client.connection_id();
    let stdin_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Err(e) = handle.send(line.into_bytes(), DeliveryMode::Reliable) {
                warn!(error = %e, "dropping line");
            }
        }
        debug!("stdin closed");
        let _ = handle.close(connection);
    });

    let mut ticker = tokio::time::interval(TICK);
    let outcome = loop {
        ticker.tick().await;

        let mut finished = None;
        for event in client.poll() {
            match event {
                PeerEvent::Connected { remote, .. } => {
                    info!(%remote, id = ?client.local_id(), "connected");
                }
                PeerEvent::DataReceived { payload, .. } => {
                    println!("{}", String::from_utf8_lossy(&payload));
                }
                PeerEvent::ClientJoined { id } => info!(id, "peer joined"),
                PeerEvent::ClientLeft { id } => info!(id, "peer left"),
                PeerEvent::Disconnected { reason, .. } => finished = Some(reason),
            }
        }
        if let Some(reason) = finished {
            break reason;
        }
    };
    stdin_task.abort();

    match outcome {
        ErrorCode::ConnectionClosed => Ok(()),
        ErrorCode::Refused => {
            warn!(reason = ?client.reject_reason(), "server refused connection");
            Err(TransportError::Refused)
        }
        ErrorCode::Timeout => Err(TransportError::Timeout),
        other => Err(TransportError::Io(std::io::Error::other(format!(
            "connection ended: {other}"
        )))),
    }
}
