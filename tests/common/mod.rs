//! Test utilities for Sockrelay
//!
//! This module provides common helpers used across integration tests.

#![allow(dead_code)]

use sockrelay::config::Config;
use sockrelay::Server;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Running relay plus the handle that stops it
pub struct TestRelay {
    /// Address the relay listens on
    pub addr: SocketAddr,
    shutdown_tx: broadcast::Sender<bool>,
}

impl TestRelay {
    /// Stop accepting new connections
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Configuration bound to an ephemeral loopback port
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.bind_addr = "127.0.0.1:0".to_string();
    config.socks.connect_timeout = 2;
    config.firewall.enabled = false;
    config
}

/// Start a relay on an ephemeral port
pub async fn start_relay() -> TestRelay {
    let server = Server::bind(&test_config()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(server.run(shutdown_rx));

    TestRelay { addr, shutdown_tx }
}

/// Start an echo server, returning its address
pub async fn start_echo_server(bind: &str) -> SocketAddr {
    let listener = TcpListener::bind(bind).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// A loopback port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Connect to the relay and complete the no-auth greeting
pub async fn connect_and_greet(relay: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(relay).await.unwrap();
    stream
        .write_all(&socks5_mock::greeting_no_auth())
        .await
        .unwrap();

    let mut selected = [0u8; 2];
    stream.read_exact(&mut selected).await.unwrap();
    assert_eq!(selected, [0x05, 0x00]);

    stream
}

/// Read one 10-byte reply
pub async fn read_reply(stream: &mut TcpStream) -> [u8; 10] {
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    reply
}

/// Mock SOCKS5 handshake data
pub mod socks5_mock {
    use sockrelay::socks::*;
    use std::net::SocketAddr;

    /// Greeting offering only no-auth
    pub fn greeting_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Request with an arbitrary command and address body
    pub fn request(command: u8, address: &[u8]) -> Vec<u8> {
        let mut cmd = vec![SOCKS5_VERSION, command, SOCKS5_RESERVED];
        cmd.extend_from_slice(address);
        cmd
    }

    /// CONNECT to a socket address
    pub fn connect_addr(addr: SocketAddr) -> Vec<u8> {
        let mut body = Vec::new();
        match addr {
            SocketAddr::V4(v4) => {
                body.push(SOCKS5_ADDR_TYPE_IPV4);
                body.extend_from_slice(&v4.ip().octets());
            }
            SocketAddr::V6(v6) => {
                body.push(SOCKS5_ADDR_TYPE_IPV6);
                body.extend_from_slice(&v6.ip().octets());
            }
        }
        body.extend_from_slice(&addr.port().to_be_bytes());
        request(SOCKS5_CMD_TCP_CONNECT, &body)
    }

    /// CONNECT to a domain
    pub fn connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut body = vec![SOCKS5_ADDR_TYPE_DOMAIN, domain.len() as u8];
        body.extend_from_slice(domain.as_bytes());
        body.extend_from_slice(&port.to_be_bytes());
        request(SOCKS5_CMD_TCP_CONNECT, &body)
    }
}
