//! # Sockrelay - Transparent SOCKS5 Relay
//!
//! Sockrelay accepts SOCKS5 clients on a TCP listener, negotiates a
//! CONNECT request with each of them and then forwards the raw byte stream
//! between the client and the requested target.
//!
//! ## Features
//!
//! - **No-auth only**: the method negotiation always selects "no authentication"
//! - **CONNECT only**: BIND and UDP ASSOCIATE are answered with "command not supported"
//! - **IPv4, IPv6 and domain targets**: domains are resolved on every request
//! - **Independent sessions**: one task per client, no state shared between them
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sockrelay::config::load_config;
//! use sockrelay::Server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("sockrelay.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     Server::bind(&config).await?.run(shutdown_rx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Server (accept) -> Session -> HandshakeEngine (AddressCodec, Dialer) -> RelayEngine
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod firewall;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{ConnectError, DecodeError, ErrorClass, HandshakeError, RelayError};
pub use server::Server;

/// Version of the Sockrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "sockrelay");
    }
}
