//! Server configuration types
//!
//! Defines the main configuration structures for the relay.

use super::TcpConfig;
use crate::socks::DEFAULT_RELAY_BUFFER_SIZE;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Smallest accepted relay chunk size
pub const MIN_RELAY_BUFFER_SIZE: usize = 512;

/// Largest accepted relay chunk size
pub const MAX_RELAY_BUFFER_SIZE: usize = 1024 * 1024;

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// SOCKS5 session configuration
    #[serde(default)]
    pub socks: SocksConfig,

    /// Firewall provisioning configuration
    #[serde(default)]
    pub firewall: FirewallConfig,
}

impl Config {
    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.socks.validate()?;
        Ok(())
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:1080".to_string()
}

/// Listener configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Socket options for accepted and dialed connections
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: default_bind_addr(),
            tcp: TcpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parsed bind address
    pub fn bind_socket_addr(&self) -> Result<SocketAddr, String> {
        self.bind_addr
            .parse()
            .map_err(|e| format!("Invalid bind address '{}': {}", self.bind_addr, e))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.bind_socket_addr().map(|_| ())
    }
}

/// Default connect timeout in seconds
fn default_connect_timeout() -> u64 {
    10
}

fn default_relay_buffer_size() -> usize {
    DEFAULT_RELAY_BUFFER_SIZE
}

/// SOCKS5 session configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SocksConfig {
    /// Dial timeout in seconds (0 disables it)
    ///
    /// Covers name resolution and the attempts on every resolved address
    /// together, not each address separately.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Relay chunk size in bytes
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,

    /// Idle timeout per relay direction in seconds (0 disables it)
    #[serde(default)]
    pub relay_idle_timeout: u64,
}

impl Default for SocksConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            relay_buffer_size: default_relay_buffer_size(),
            relay_idle_timeout: 0,
        }
    }
}

impl SocksConfig {
    /// Dial timeout, `None` when disabled
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout > 0).then(|| Duration::from_secs(self.connect_timeout))
    }

    /// Relay idle timeout, `None` when disabled
    pub fn relay_idle_timeout(&self) -> Option<Duration> {
        (self.relay_idle_timeout > 0).then(|| Duration::from_secs(self.relay_idle_timeout))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_RELAY_BUFFER_SIZE..=MAX_RELAY_BUFFER_SIZE).contains(&self.relay_buffer_size) {
            return Err(format!(
                "relay_buffer_size must be between {} and {} bytes, got {}",
                MIN_RELAY_BUFFER_SIZE, MAX_RELAY_BUFFER_SIZE, self.relay_buffer_size
            ));
        }
        Ok(())
    }
}

fn default_firewall_enabled() -> bool {
    true
}

fn default_rule_name() -> String {
    "sockrelay SOCKS5 proxy".to_string()
}

/// Firewall provisioning configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FirewallConfig {
    /// Try to add an inbound allow rule at startup
    #[serde(default = "default_firewall_enabled")]
    pub enabled: bool,

    /// Name of the rule (netsh) or its comment (ufw)
    #[serde(default = "default_rule_name")]
    pub rule_name: String,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        FirewallConfig {
            enabled: default_firewall_enabled(),
            rule_name: default_rule_name(),
        }
    }
}
