//! Bidirectional relay
//!
//! Copies bytes between the client and the target once negotiation has
//! succeeded. Two forwarding loops run concurrently and the relay only
//! returns after both have stopped.

use super::consts::DEFAULT_RELAY_BUFFER_SIZE;
use crate::config::SocksConfig;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::debug;

/// Bytes forwarded in each direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from the client to the target
    pub client_to_remote: u64,
    /// Bytes copied from the target to the client
    pub remote_to_client: u64,
}

/// Why a forwarding loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    Eof,
    Idle,
    Failed,
    Aborted,
}

/// Relay settings shared by every session
#[derive(Debug, Clone)]
pub struct RelayEngine {
    buffer_size: usize,
    idle_timeout: Option<Duration>,
}

impl Default for RelayEngine {
    fn default() -> Self {
        RelayEngine {
            buffer_size: DEFAULT_RELAY_BUFFER_SIZE,
            idle_timeout: None,
        }
    }
}

impl RelayEngine {
    /// Create a relay engine from the SOCKS section of the configuration
    pub fn from_config(config: &SocksConfig) -> Self {
        RelayEngine {
            buffer_size: config.relay_buffer_size,
            idle_timeout: config.relay_idle_timeout(),
        }
    }

    /// Set the per-read chunk size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the idle timeout per direction
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Relay until both directions have stopped
    ///
    /// A clean EOF on one side shuts down the write side of the other, so
    /// the peer sees the close and ends the opposite direction in turn. A
    /// read or write error aborts both directions at once. Both streams
    /// are dropped before this returns.
    pub async fn relay<C, R>(&self, client: C, remote: R) -> RelayStats
    where
        C: AsyncRead + AsyncWrite + Unpin,
        R: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut remote_read, mut remote_write) = tokio::io::split(remote);
        let (abort_tx, abort_rx) = watch::channel(false);

        let (up, down) = tokio::join!(
            self.forward(
                "client->remote",
                &mut client_read,
                &mut remote_write,
                &abort_tx,
                abort_rx.clone(),
            ),
            self.forward(
                "remote->client",
                &mut remote_read,
                &mut client_write,
                &abort_tx,
                abort_rx,
            ),
        );

        RelayStats {
            client_to_remote: up,
            remote_to_client: down,
        }
    }

    async fn forward<R, W>(
        &self,
        direction: &'static str,
        reader: &mut R,
        writer: &mut W,
        abort_tx: &watch::Sender<bool>,
        mut abort_rx: watch::Receiver<bool>,
    ) -> u64
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; self.buffer_size];
        let mut total = 0u64;

        let end = loop {
            let read = tokio::select! {
                read = self.read_chunk(reader, &mut buf) => read,
                _ = abort_rx.wait_for(|aborted| *aborted) => break LoopEnd::Aborted,
            };

            let n = match read {
                None => break LoopEnd::Idle,
                Some(Ok(0)) => break LoopEnd::Eof,
                Some(Ok(n)) => n,
                Some(Err(e)) => {
                    debug!("{} read error: {}", direction, e);
                    break LoopEnd::Failed;
                }
            };

            if let Err(e) = writer.write_all(&buf[..n]).await {
                debug!("{} write error: {}", direction, e);
                break LoopEnd::Failed;
            }
            total += n as u64;
        };

        if end == LoopEnd::Failed {
            let _ = abort_tx.send(true);
        }
        let _ = writer.shutdown().await;

        debug!("{} finished ({:?}): {} bytes", direction, end, total);
        total
    }

    /// One read, `None` when the idle timeout expired first
    async fn read_chunk<R>(&self, reader: &mut R, buf: &mut [u8]) -> Option<io::Result<usize>>
    where
        R: AsyncRead + Unpin,
    {
        match self.idle_timeout {
            Some(idle) => tokio::time::timeout(idle, reader.read(buf)).await.ok(),
            None => Some(reader.read(buf).await),
        }
    }
}
