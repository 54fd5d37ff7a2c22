//! Core constants, configuration and error types.

mod config;
pub mod constants;
mod error;

pub use config::{TransportConfig, TransportConfigBuilder};
pub use error::{
    ConfigError, DisconnectReason, ErrorCode, FrameError, TransportError, TransportResult,
};
