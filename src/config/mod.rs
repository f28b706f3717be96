//! Configuration module for Sockrelay
//!
//! This module provides configuration types and parsing for the relay.
//! Every field has a default, so an empty document is a valid config.

mod server;
mod transport;

pub use server::{
    Config, FirewallConfig, ServerConfig, SocksConfig, MAX_RELAY_BUFFER_SIZE,
    MIN_RELAY_BUFFER_SIZE,
};
pub use transport::TcpConfig;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| "Invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:1080");
        assert_eq!(config.socks.relay_buffer_size, 4096);
        assert!(config.firewall.enabled);
    }

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"
[server]
bind_addr = "127.0.0.1:9050"

[server.tcp]
nodelay = false
keepalive_secs = 30
keepalive_interval = 10

[socks]
connect_timeout = 5
relay_buffer_size = 8192
relay_idle_timeout = 300

[firewall]
enabled = false
rule_name = "relay"
"#;

        let config = parse_config(config_str).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9050");
        assert!(!config.server.tcp.nodelay);
        assert_eq!(config.server.tcp.keepalive_secs, 30);
        assert_eq!(config.socks.connect_timeout, 5);
        assert_eq!(config.socks.relay_buffer_size, 8192);
        assert_eq!(config.socks.relay_idle_timeout, 300);
        assert!(!config.firewall.enabled);
        assert_eq!(config.firewall.rule_name, "relay");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = parse_config("[server]\nbind_addr = \"nowhere\"\n");
        assert!(result.is_err());

        let result = parse_config("[socks]\nconnect_timeout = \"soon\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind_addr = \"127.0.0.1:1081\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:1081");
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("missing.toml"));
        assert!(result.is_err());
    }
}
