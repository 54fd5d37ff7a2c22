//! Transport configuration.

use std::time::Duration;

use super::constants;
use super::error::ConfigError;

/// Tunables shared by servers and clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Largest payload accepted by `send`.
    pub max_payload_size: usize,

    /// Delay before an unacknowledged message is sent again.
    pub retry_interval: Duration,

    /// Resends allowed before the connection times out.
    pub max_retries: u32,

    /// Interval between liveness probes.
    pub heartbeat_interval: Duration,

    /// Idle timeout, in heartbeat intervals.
    pub timeout_multiplier: u32,

    /// How long a client keeps retrying the handshake.
    pub handshake_timeout: Duration,

    /// Delay between a local close and teardown.
    pub disconnect_grace: Duration,

    /// Server connection limit.
    pub max_connections: usize,

    /// Datagrams queued for the socket before sends report congestion.
    pub outbound_queue_capacity: usize,

    /// Datagrams buffered between the socket reader and `poll()`.
    pub inbound_queue_capacity: usize,

    /// Receive buffer size for the socket reader.
    pub recv_buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_payload_size: constants::MAX_PAYLOAD_SIZE,
            retry_interval: constants::DEFAULT_RETRY_INTERVAL,
            max_retries: constants::DEFAULT_MAX_RETRIES,
            heartbeat_interval: constants::DEFAULT_HEARTBEAT_INTERVAL,
            timeout_multiplier: constants::DEFAULT_TIMEOUT_MULTIPLIER,
            handshake_timeout: constants::DEFAULT_HANDSHAKE_TIMEOUT,
            disconnect_grace: constants::DEFAULT_DISCONNECT_GRACE,
            max_connections: constants::DEFAULT_MAX_CONNECTIONS,
            outbound_queue_capacity: constants::DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            inbound_queue_capacity: constants::DEFAULT_INBOUND_QUEUE_CAPACITY,
            recv_buffer_size: constants::DEFAULT_RECV_BUFFER_SIZE,
        }
    }
}

impl TransportConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::new()
    }

    /// Time without inbound traffic after which a connection times out.
    pub fn idle_timeout(&self) -> Duration {
        self.heartbeat_interval * self.timeout_multiplier
    }

    /// Check every value for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("retry interval"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("heartbeat interval"));
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::ZeroInterval("handshake timeout"));
        }
        if self.timeout_multiplier < 3 {
            return Err(ConfigError::TimeoutMultiplier(self.timeout_multiplier));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::NoRetries);
        }
        if self.max_connections == 0 {
            return Err(ConfigError::NoConnections);
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("outbound queue"));
        }
        if self.inbound_queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("inbound queue"));
        }
        if self.recv_buffer_size == 0 {
            return Err(ConfigError::ZeroCapacity("receive buffer"));
        }
        if self.max_payload_size > constants::MAX_PAYLOAD_SIZE {
            return Err(ConfigError::PayloadLimit {
                size: self.max_payload_size,
                max: constants::MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Clone, Default)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    /// Create a builder holding the default configuration.
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
        }
    }

    /// Set the maximum payload size.
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Set the retransmission interval.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_interval = interval;
        self
    }

    /// Set the retry ceiling.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the heartbeat interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set the idle timeout as a multiple of the heartbeat interval.
    pub fn timeout_multiplier(mut self, multiplier: u32) -> Self {
        self.config.timeout_multiplier = multiplier;
        self
    }

    /// Set the handshake timeout.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set the grace period for local closes.
    pub fn disconnect_grace(mut self, grace: Duration) -> Self {
        self.config.disconnect_grace = grace;
        self
    }

    /// Set the server connection limit.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set the outbound queue capacity.
    pub fn outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_queue_capacity = capacity;
        self
    }

    /// Set the inbound queue capacity.
    pub fn inbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.inbound_queue_capacity = capacity;
        self
    }

    /// Set the socket receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<TransportConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
