//! Environment-driven settings.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

/// Default port for both roles.
pub const DEFAULT_PORT: u16 = 7777;

/// Errors from reading the environment.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Unknown RELIANT_MODE.
    #[error("RELIANT_MODE must be \"server\" or \"client\", got {0:?}")]
    Mode(String),

    /// Unparseable bind address.
    #[error("RELIANT_BIND_ADDR is not a socket address: {0:?}")]
    BindAddr(String),

    /// Unparseable port.
    #[error("RELIANT_SERVER_PORT is not a port number: {0:?}")]
    Port(String),
}

/// Which side to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Server,
    Client,
}

/// Demo settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: Mode,
    pub bind_addr: SocketAddr,
    pub server_host: String,
    pub server_port: u16,
    pub log_level: String,
}

impl Settings {
    /// Read settings from `RELIANT_*` variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mode = match lookup("RELIANT_MODE").as_deref() {
            None | Some("server") => Mode::Server,
            Some("client") => Mode::Client,
            Some(other) => return Err(SettingsError::Mode(other.to_string())),
        };

        let bind_addr = match lookup("RELIANT_BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|_| SettingsError::BindAddr(raw))?,
            None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        };

        let server_port = match lookup("RELIANT_SERVER_PORT") {
            Some(raw) => raw.parse().map_err(|_| SettingsError::Port(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            mode,
            bind_addr,
            server_host: lookup("RELIANT_SERVER_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            server_port,
            log_level: lookup("RELIANT_LOG_LEVEL").unwrap_or_else(|| "info".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.mode, Mode::Server);
        assert_eq!(s.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(s.server_host, "127.0.0.1");
        assert_eq!(s.log_level, "info");
    }

    #[test]
    fn test_client_settings() {
        let s = settings(&[
            ("RELIANT_MODE", "client"),
            ("RELIANT_SERVER_HOST", "example.net"),
            ("RELIANT_SERVER_PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(s.mode, Mode::Client);
        assert_eq!(s.server_host, "example.net");
        assert_eq!(s.server_port, 9000);
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            settings(&[("RELIANT_MODE", "relay")]),
            Err(SettingsError::Mode(_))
        ));
        assert!(matches!(
            settings(&[("RELIANT_SERVER_PORT", "99999")]),
            Err(SettingsError::Port(_))
        ));
        assert!(matches!(
            settings(&[("RELIANT_BIND_ADDR", "nowhere")]),
            Err(SettingsError::BindAddr(_))
        ));
    }
}
