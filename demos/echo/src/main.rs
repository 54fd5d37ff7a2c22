//! Reliant Echo Demo
//!
//! The server echoes every payload back on the delivery mode it arrived
//! with. The client sends each stdin line as a Reliable message and prints
//! the echo.
//!
//! Environment variables:
//! - RELIANT_MODE: "server" or "client"
//! - RELIANT_BIND_ADDR: Bind address (server only, default 0.0.0.0:7777)
//! - RELIANT_SERVER_HOST: Server hostname (client only, default 127.0.0.1)
//! - RELIANT_SERVER_PORT: Server port (client only, default 7777)
//! - RELIANT_LOG_LEVEL: trace|debug|info|warn|error (used when RUST_LOG is unset)

mod client;
mod logging;
mod server;
mod settings;

use std::process::ExitCode;

use settings::{Mode, Settings};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("reliant-echo: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::setup_logging(&settings.log_level);

    let result = match settings.mode {
        Mode::Server => server::run(&settings).await,
        Mode::Client => client::run(&settings).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "echo demo failed");
            ExitCode::FAILURE
        }
    }
}
