//! Test doubles shared by the SOCKS5 unit tests

use crate::error::ConnectError;
use crate::socks::AddressSpec;
use crate::transport::Dialer;
use async_trait::async_trait;
use std::io;
use std::sync::Mutex;
use tokio::io::{duplex, DuplexStream};

/// Dialer that records targets and hands out in-memory streams
#[derive(Debug, Default)]
pub struct MockDialer {
    fail_with: Option<io::ErrorKind>,
    dialed: Mutex<Vec<AddressSpec>>,
    /// Remote ends of handed-out streams, kept for inspection
    peers: Mutex<Vec<DuplexStream>>,
}

impl MockDialer {
    /// Every connect succeeds
    pub fn reachable() -> Self {
        Self::default()
    }

    /// Every connect fails with `kind`
    pub fn failing(kind: io::ErrorKind) -> Self {
        MockDialer {
            fail_with: Some(kind),
            ..Default::default()
        }
    }

    /// Targets dialed so far
    pub fn dialed(&self) -> Vec<AddressSpec> {
        self.dialed.lock().unwrap().clone()
    }

    /// Take the remote end of the most recent connection
    pub fn take_peer(&self) -> Option<DuplexStream> {
        self.peers.lock().unwrap().pop()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    type Stream = DuplexStream;

    async fn connect(&self, target: &AddressSpec) -> Result<DuplexStream, ConnectError> {
        self.dialed.lock().unwrap().push(target.clone());

        if let Some(kind) = self.fail_with {
            return Err(ConnectError::Io {
                target: target.to_string(),
                source: io::Error::from(kind),
            });
        }

        let (local, remote) = duplex(8192);
        self.peers.lock().unwrap().push(remote);
        Ok(local)
    }
}

/// In-memory log sink for a scoped subscriber
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(std::sync::Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Everything written so far
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route events on the current thread into a [`CapturedLogs`] buffer
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}
