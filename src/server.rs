//! TCP listener
//!
//! Accepts client connections and runs each one as an independent
//! [`Session`] on its own task. Nothing a session does can stop the accept
//! loop; only the shutdown signal does.

use crate::config::Config;
use crate::error::RelayError;
use crate::socks::{RelayEngine, Session};
use crate::transport::{Dialer, SocketOpts, TcpDialer};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span, warn};

/// Listening SOCKS5 relay
#[derive(Debug)]
pub struct Server<D = TcpDialer> {
    listener: TcpListener,
    dialer: Arc<D>,
    relay: RelayEngine,
    socket_opts: SocketOpts,
}

impl Server<TcpDialer> {
    /// Bind the listener described by the configuration
    pub async fn bind(config: &Config) -> Result<Self, RelayError> {
        config.validate().map_err(RelayError::Config)?;
        let addr = config
            .server
            .bind_socket_addr()
            .map_err(RelayError::Config)?;

        let listener = TcpListener::bind(addr).await?;
        info!("SOCKS5 relay listening on {}", listener.local_addr()?);

        let socket_opts = SocketOpts::from_tcp_config(&config.server.tcp);
        Ok(Server {
            listener,
            dialer: Arc::new(TcpDialer::from_config(&config.socks, socket_opts.clone())),
            relay: RelayEngine::from_config(&config.socks),
            socket_opts,
        })
    }
}

impl<D: Dialer> Server<D> {
    /// Replace the dialer used for outbound connections
    pub fn with_dialer<E: Dialer>(self, dialer: E) -> Server<E> {
        Server {
            listener: self.listener,
            dialer: Arc::new(dialer),
            relay: self.relay,
            socket_opts: self.socket_opts,
        }
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<(), RelayError> {
        let mut backoff = accept_backoff();
        let mut next_id: u64 = 0;

        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
            };

            match accepted {
                Ok((stream, peer)) => {
                    backoff.reset();
                    next_id += 1;
                    self.spawn_session(stream, peer, next_id);
                }
                Err(e) => {
                    // Usually fd exhaustion; pause instead of spinning
                    let Some(delay) = backoff.next_backoff() else {
                        error!("Failed to accept connection: {}. Giving up", e);
                        return Err(e.into());
                    };
                    error!("Failed to accept connection: {}. Retry in {:?}", e, delay);

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown_rx.recv() => {
                            info!("Shutdown signal received, stopping listener");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr, id: u64) {
        if let Err(e) = self.socket_opts.apply(&stream) {
            warn!("Failed to apply socket options to {}: {}", peer, e);
        }

        let span = info_span!("session", id, %peer);
        debug!(parent: &span, "Accepted connection");

        let session = Session::new(stream, self.dialer.clone(), self.relay.clone(), span.clone());
        tokio::spawn(async move {
            let outcome = session.run().await;
            debug!(parent: &span, "Session closed: {:?}", outcome);
        });
    }
}

fn accept_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: Duration::from_millis(50),
        initial_interval: Duration::from_millis(50),
        max_interval: Duration::from_secs(1),
        max_elapsed_time: None,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> Config {
        let mut config = Config::default();
        config.server.bind_addr = "127.0.0.1:0".to_string();
        config
    }

    #[tokio::test]
    async fn test_bind_reports_local_addr() {
        let server = Server::bind(&local_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let mut config = local_config();
        config.server.bind_addr = "localhost".to_string();

        let err = Server::bind(&config).await.unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let server = Server::bind(&local_config()).await.unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let running = tokio::spawn(server.run(shutdown_rx));
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), running)
            .await
            .expect("listener did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_with_dialer_routes_sessions() {
        use crate::socks::test_util::MockDialer;
        use crate::socks::{encode_reply, ReplyCode};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // TcpDialer would answer a closed loopback port with HostUnreachable
        let server = Server::bind(&local_config())
            .await
            .unwrap()
            .with_dialer(MockDialer::failing(std::io::ErrorKind::PermissionDenied));
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(server.run(shutdown_rx));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(&[0x05, 0x01, 0x00, 0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0, 9])
            .await
            .unwrap();

        let mut received = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut received))
            .await
            .expect("session did not close")
            .unwrap();

        let mut expected = vec![0x05, 0x00];
        expected.extend_from_slice(&encode_reply(ReplyCode::GeneralFailure));
        assert_eq!(received, expected);

        let _ = shutdown_tx.send(true);
    }

    #[test]
    fn test_accept_backoff_never_gives_up() {
        let mut backoff = accept_backoff();
        for _ in 0..100 {
            let delay = backoff.next_backoff().unwrap();
            assert!(delay <= Duration::from_millis(1500));
        }
        backoff.reset();
        assert!(backoff.next_backoff().unwrap() <= Duration::from_millis(100));
    }
}
