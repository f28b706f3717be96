//! Host firewall provisioning
//!
//! Opens the listener port in the host firewall once at startup. This is
//! best effort: every failure is reported and the relay starts anyway.

use crate::config::FirewallConfig;
use crate::error::RelayError;
use std::fmt;
use tokio::process::Command;
use tracing::{info, warn};

/// Firewall tool driven by the provisioner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallBackend {
    /// Windows `netsh advfirewall`
    Netsh,
    /// Uncomplicated Firewall
    Ufw,
}

/// Result of a provisioning attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A new allow rule was added
    Added,
    /// A matching rule was already present
    AlreadyPresent,
    /// Nothing was changed
    Skipped(String),
}

/// A command line to run, kept separate from execution for testing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallCommand {
    /// Program to run
    pub program: &'static str,
    /// Arguments, unquoted
    pub args: Vec<String>,
}

impl fmt::Display for FirewallCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}

impl FirewallCommand {
    fn new(program: &'static str, args: &[&str]) -> Self {
        FirewallCommand {
            program,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    async fn output(&self) -> Result<std::process::Output, RelayError> {
        Command::new(self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| RelayError::Firewall(format!("failed to run '{}': {}", self, e)))
    }
}

impl FirewallBackend {
    /// Pick the backend for this host, if any
    pub async fn detect() -> Option<Self> {
        if cfg!(windows) {
            return Some(FirewallBackend::Netsh);
        }

        let found = Command::new("which")
            .arg("ufw")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false);
        found.then_some(FirewallBackend::Ufw)
    }

    /// Command whose success means the rule already exists
    pub fn show_rule_command(&self, rule_name: &str) -> FirewallCommand {
        match self {
            FirewallBackend::Netsh => FirewallCommand::new(
                "netsh",
                &["advfirewall", "firewall", "show", "rule", &format!("name={}", rule_name)],
            ),
            FirewallBackend::Ufw => FirewallCommand::new("ufw", &["status"]),
        }
    }

    /// Command adding an inbound TCP allow rule for `port`
    pub fn add_rule_command(&self, rule_name: &str, port: u16) -> FirewallCommand {
        match self {
            FirewallBackend::Netsh => FirewallCommand::new(
                "netsh",
                &[
                    "advfirewall",
                    "firewall",
                    "add",
                    "rule",
                    &format!("name={}", rule_name),
                    "dir=in",
                    "action=allow",
                    "protocol=TCP",
                    &format!("localport={}", port),
                ],
            ),
            FirewallBackend::Ufw => FirewallCommand::new(
                "ufw",
                &["allow", &format!("{}/tcp", port), "comment", rule_name],
            ),
        }
    }

    /// Whether a show-rule result means the rule exists
    fn rule_present(&self, output: &std::process::Output, port: u16) -> bool {
        match self {
            FirewallBackend::Netsh => output.status.success(),
            FirewallBackend::Ufw => {
                output.status.success()
                    && ufw_status_lists_port(&String::from_utf8_lossy(&output.stdout), port)
            }
        }
    }
}

/// True when `ufw status` output already allows `port/tcp`
fn ufw_status_lists_port(status: &str, port: u16) -> bool {
    let needle = format!("{}/tcp", port);
    status.lines().any(|line| {
        let mut fields = line.split_whitespace();
        fields.next() == Some(needle.as_str()) && line.contains("ALLOW")
    })
}

/// Whether the process may change firewall rules
pub async fn is_privileged() -> bool {
    if cfg!(windows) {
        return Command::new("net")
            .arg("session")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false);
    }

    Command::new("id")
        .arg("-u")
        .output()
        .await
        .map(|output| output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "0")
        .unwrap_or(false)
}

/// Ensure an inbound allow rule exists for the listener port
pub async fn provision(config: &FirewallConfig, port: u16) -> Result<ProvisionOutcome, RelayError> {
    if !config.enabled {
        return Ok(ProvisionOutcome::Skipped("disabled by configuration".to_string()));
    }

    let Some(backend) = FirewallBackend::detect().await else {
        return Ok(ProvisionOutcome::Skipped("no supported firewall tool found".to_string()));
    };

    if !is_privileged().await {
        warn!("Not running with administrative privileges. Cannot configure firewall automatically.");
        warn!("Allow inbound TCP port {} manually or restart with elevated privileges.", port);
        return Ok(ProvisionOutcome::Skipped("insufficient privileges".to_string()));
    }

    let show = backend.show_rule_command(&config.rule_name);
    if backend.rule_present(&show.output().await?, port) {
        info!("Firewall rule '{}' already exists", config.rule_name);
        return Ok(ProvisionOutcome::AlreadyPresent);
    }

    info!("Adding firewall rule for port {}...", port);
    let add = backend.add_rule_command(&config.rule_name, port);
    let output = add.output().await?;
    if !output.status.success() {
        return Err(RelayError::Firewall(format!(
            "'{}' failed: {}",
            add,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    info!("Successfully added firewall rule: allow TCP {}", port);
    Ok(ProvisionOutcome::Added)
}
