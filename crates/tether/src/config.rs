// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint configuration.
//!
//! Supports both programmatic (builder) and file-based (TOML) configuration.
//!
//! ```toml
//! pattern = "push"
//! address = "inproc://jobs"
//! attach = true
//! buffer_size = 1000
//! retry_attempts = 3
//! retry_interval_ms = 250
//! registry_address = "inproc://registry"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Messaging pattern: pub, sub, push, pull, req or rep.
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Transport address.
    #[serde(default)]
    pub address: String,

    /// Connect to `address` instead of binding it.
    #[serde(default)]
    pub attach: bool,

    /// Capacity of the pattern's working queues.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Send high-water mark handed to the transport.
    #[serde(default = "default_buffer_size")]
    pub send_hwm: usize,

    /// Send timeout in milliseconds (0 = transport default, 3 s for req/rep).
    #[serde(default)]
    pub send_timeout_ms: u64,

    /// Receive timeout in milliseconds (0 = transport default, 3 s for req/rep).
    #[serde(default)]
    pub recv_timeout_ms: u64,

    /// Resend attempts after the initial send fails.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u8,

    /// Backoff between resend attempts (milliseconds).
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// Delay before a faulted task is relaunched (milliseconds).
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// Upper bound on transport reconnect backoff (milliseconds, 0 = unset).
    #[serde(default)]
    pub reconnect_interval_max_ms: u64,

    /// Transport heartbeat interval (seconds, 0 = unset).
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Transport heartbeat timeout (seconds, 0 = unset).
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    /// Transport heartbeat TTL (seconds, 0 = unset).
    #[serde(default = "default_heartbeat_ttl")]
    pub heartbeat_ttl_secs: u64,

    /// Enable TCP keepalive on the transport.
    #[serde(default)]
    pub tcp_keepalive: bool,

    /// TCP keepalive idle time (seconds, -1 = OS default).
    #[serde(default = "default_keepalive_unset")]
    pub tcp_keepalive_idle_secs: i32,

    /// TCP keepalive probe count (-1 = OS default).
    #[serde(default = "default_keepalive_unset")]
    pub tcp_keepalive_count: i32,

    /// Deadline for flushing queues on release (milliseconds).
    #[serde(default = "default_exit_wait_timeout")]
    pub exit_wait_timeout_ms: u64,

    /// Registry service address; the registrar is disabled when unset.
    #[serde(default)]
    pub registry_address: Option<String>,

    /// Heartbeat period towards the registry (milliseconds, defaults to the
    /// reconnect interval).
    #[serde(default)]
    pub register_interval_ms: Option<u64>,

    /// Never relaunch faulted tasks.
    #[serde(default)]
    pub disable_restart: bool,
}

fn default_pattern() -> String {
    "push".to_string()
}

fn default_buffer_size() -> usize {
    10_000
}

fn default_retry_attempts() -> u8 {
    5
}

fn default_retry_interval() -> u64 {
    1000
}

fn default_reconnect_interval() -> u64 {
    100
}

fn default_heartbeat_interval() -> u64 {
    15
}

fn default_heartbeat_timeout() -> u64 {
    5
}

fn default_heartbeat_ttl() -> u64 {
    30
}

fn default_keepalive_unset() -> i32 {
    -1
}

fn default_exit_wait_timeout() -> u64 {
    30_000
}

/// Send/receive timeout applied to req/rep endpoints left at 0.
const REQUEST_REPLY_TIMEOUT_MS: u64 = 3000;

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            address: String::new(),
            attach: false,
            buffer_size: default_buffer_size(),
            send_hwm: default_buffer_size(),
            send_timeout_ms: 0,
            recv_timeout_ms: 0,
            retry_attempts: default_retry_attempts(),
            retry_interval_ms: default_retry_interval(),
            reconnect_interval_ms: default_reconnect_interval(),
            reconnect_interval_max_ms: 0,
            heartbeat_interval_secs: default_heartbeat_interval(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            heartbeat_ttl_secs: default_heartbeat_ttl(),
            tcp_keepalive: false,
            tcp_keepalive_idle_secs: default_keepalive_unset(),
            tcp_keepalive_count: default_keepalive_unset(),
            exit_wait_timeout_ms: default_exit_wait_timeout(),
            registry_address: None,
            register_interval_ms: None,
            disable_restart: false,
        }
    }
}

impl EndpointConfig {
    /// Create a new config builder.
    pub fn builder() -> EndpointConfigBuilder {
        EndpointConfigBuilder::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::Invalid("address cannot be empty".into()));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size cannot be 0".into()));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid("retry_attempts cannot be 0".into()));
        }
        if self.exit_wait_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "exit_wait_timeout_ms cannot be 0".into(),
            ));
        }
        if let Some(registry) = &self.registry_address {
            if registry.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "registry_address cannot be empty when set".into(),
                ));
            }
        }
        if self.register_interval_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "register_interval_ms cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Apply the request/reply timeout fallback.
    pub(crate) fn with_request_reply_defaults(mut self) -> Self {
        if self.send_timeout_ms == 0 {
            self.send_timeout_ms = REQUEST_REPLY_TIMEOUT_MS;
        }
        if self.recv_timeout_ms == 0 {
            self.recv_timeout_ms = REQUEST_REPLY_TIMEOUT_MS;
        }
        self
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn reconnect_interval_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_max_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs)
    }

    pub fn exit_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_wait_timeout_ms)
    }

    /// Registrar heartbeat period.
    pub fn register_interval(&self) -> Duration {
        self.register_interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.reconnect_interval())
    }
}

/// Config builder for fluent API.
#[derive(Debug, Default)]
pub struct EndpointConfigBuilder {
    config: EndpointConfig,
}

impl EndpointConfigBuilder {
    /// Messaging pattern name.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.pattern = pattern.into();
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// Connect instead of bind.
    pub fn attach(mut self, attach: bool) -> Self {
        self.config.attach = attach;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn send_hwm(mut self, hwm: usize) -> Self {
        self.config.send_hwm = hwm;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.config.recv_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn retry_attempts(mut self, attempts: u8) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn reconnect_interval_max(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval_max_ms = interval.as_millis() as u64;
        self
    }

    /// Heartbeat interval, timeout and TTL in seconds (0 leaves one unset).
    pub fn heartbeat(mut self, interval_secs: u64, timeout_secs: u64, ttl_secs: u64) -> Self {
        self.config.heartbeat_interval_secs = interval_secs;
        self.config.heartbeat_timeout_secs = timeout_secs;
        self.config.heartbeat_ttl_secs = ttl_secs;
        self
    }

    /// Enable TCP keepalive with idle seconds and probe count (-1 = OS default).
    pub fn tcp_keepalive(mut self, idle_secs: i32, count: i32) -> Self {
        self.config.tcp_keepalive = true;
        self.config.tcp_keepalive_idle_secs = idle_secs;
        self.config.tcp_keepalive_count = count;
        self
    }

    pub fn exit_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.exit_wait_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn registry_address(mut self, address: impl Into<String>) -> Self {
        self.config.registry_address = Some(address.into());
        self
    }

    pub fn register_interval(mut self, interval: Duration) -> Self {
        self.config.register_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn disable_restart(mut self, disable: bool) -> Self {
        self.config.disable_restart = disable;
        self
    }

    /// Build the configuration
    pub fn build(self) -> EndpointConfig {
        self.config
    }
}
