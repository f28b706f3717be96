//! TCP dialer
//!
//! Resolves the decoded target and opens a plain TCP connection to it.

use super::{Dialer, SocketOpts};
use crate::config::SocksConfig;
use crate::error::ConnectError;
use crate::socks::AddressSpec;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Dialer producing plain TCP streams
#[derive(Debug, Clone)]
pub struct TcpDialer {
    /// Socket options to apply to connections
    socket_opts: SocketOpts,
    /// Budget for resolving and dialing a target, `None` waits for the OS
    connect_timeout: Option<Duration>,
}

impl TcpDialer {
    /// Create a new TCP dialer with default options
    pub fn with_defaults() -> Self {
        TcpDialer {
            socket_opts: SocketOpts::default(),
            connect_timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Create a dialer from the SOCKS section of the configuration
    pub fn from_config(config: &SocksConfig, socket_opts: SocketOpts) -> Self {
        TcpDialer {
            socket_opts,
            connect_timeout: config.connect_timeout(),
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn resolve(&self, target: &AddressSpec) -> Result<Vec<SocketAddr>, ConnectError> {
        if let Some(addr) = target.socket_addr() {
            return Ok(vec![addr]);
        }

        let host = target.host();
        if host.is_empty() {
            return Err(ConnectError::EmptyHost);
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), target.port()))
            .await
            .map_err(|source| ConnectError::Resolve {
                host: host.clone(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(ConnectError::NoAddresses(host));
        }

        debug!("Resolved {} to {:?}", target, addrs);
        Ok(addrs)
    }

    /// One attempt per resolved address, in resolver order
    async fn dial(&self, target: &AddressSpec) -> Result<TcpStream, ConnectError> {
        let addrs = self.resolve(target).await?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    if let Err(e) = self.socket_opts.apply(&stream) {
                        warn!("Failed to apply socket options: {}", e);
                    }
                    debug!("TCP connection established to {}", addr);
                    return Ok(stream);
                }
                Err(source) => {
                    debug!("Connect attempt to {} failed: {}", addr, source);
                    last_err = Some(ConnectError::Io {
                        target: addr.to_string(),
                        source,
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ConnectError::NoAddresses(target.host())))
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    /// The timeout covers resolution and every attempt together
    async fn connect(&self, target: &AddressSpec) -> Result<TcpStream, ConnectError> {
        match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.dial(target))
                .await
                .map_err(|_| ConnectError::Timeout {
                    target: target.to_string(),
                    after: timeout,
                })?,
            None => self.dial(target).await,
        }
    }
}
