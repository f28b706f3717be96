//! Per-connection supervisor
//!
//! A [`Session`] owns one accepted client stream for its whole life: it
//! runs the handshake, turns a failed phase into a reply (or a silent
//! close), hands a negotiated connection to the relay, and releases both
//! streams on every exit path.

use super::codec::write_reply;
use super::handshake::{HandshakeEngine, Negotiated};
use super::relay::{RelayEngine, RelayStats};
use super::types::{AddressSpec, ReplyCode, SessionState};
use crate::transport::Dialer;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn, Instrument, Span};

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Negotiation succeeded and the relay ran to completion
    Relayed {
        /// Target the client asked for
        target: AddressSpec,
        /// Bytes forwarded in each direction
        stats: RelayStats,
    },
    /// A failure reply was sent before closing
    Rejected(ReplyCode),
    /// Closed without sending a reply
    Dropped,
}

/// One client connection, from accept to teardown
pub struct Session<S, D> {
    client: S,
    dialer: Arc<D>,
    relay: RelayEngine,
    span: Span,
    state: SessionState,
}

impl<S, D> Session<S, D>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    D: Dialer,
{
    /// Create a session
    ///
    /// Every event the session emits is recorded inside `span`.
    pub fn new(client: S, dialer: Arc<D>, relay: RelayEngine, span: Span) -> Self {
        Session {
            client,
            dialer,
            relay,
            span,
            state: SessionState::default(),
        }
    }

    /// Drive the session to completion
    pub async fn run(self) -> SessionOutcome {
        let span = self.span.clone();
        self.supervise().instrument(span).await
    }

    async fn supervise(mut self) -> SessionOutcome {
        let negotiated = HandshakeEngine::new(&mut self.client, self.dialer.as_ref())
            .run(&mut self.state)
            .await;

        match negotiated {
            Ok(Negotiated { target, remote }) => {
                let stats = self.relay.relay(self.client, remote).await;
                let _ = self.state.advance(SessionState::Closed);

                debug!(
                    "Relay to {} finished: {} bytes up, {} bytes down",
                    target, stats.client_to_remote, stats.remote_to_client
                );
                SessionOutcome::Relayed { target, stats }
            }
            Err(e) => {
                let outcome = match e.reply_code() {
                    Some(code) => {
                        warn!("Rejecting request in {}: {} ({})", self.state, e, code);
                        if let Err(write_err) = write_reply(&mut self.client, code).await {
                            debug!("Failed to send {} reply: {}", code, write_err);
                        }
                        SessionOutcome::Rejected(code)
                    }
                    None => {
                        debug!("Dropping connection in {}: {}", self.state, e);
                        SessionOutcome::Dropped
                    }
                };

                let _ = self.client.shutdown().await;
                let _ = self.state.advance(SessionState::Closed);
                outcome
            }
        }
    }
}
