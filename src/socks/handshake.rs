//! SOCKS5 handshake engine
//!
//! Drives one client stream from the greeting to an established outbound
//! connection. Every phase returns either the next phase or a
//! [`HandshakeError`]; replies for failures are left to the caller, which
//! consults [`HandshakeError::reply_code`].

use super::codec::{decode_address_with_type, write_reply};
use super::consts::*;
use super::types::{AddressSpec, ReplyCode, SessionState, SocksCommand};
use crate::error::HandshakeError;
use crate::transport::Dialer;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Result of a successful negotiation
#[derive(Debug)]
pub struct Negotiated<R> {
    /// Decoded target
    pub target: AddressSpec,
    /// Established outbound stream
    pub remote: R,
}

/// Internal phase, carrying whatever the previous phase decoded
#[derive(Debug)]
enum Phase<R> {
    AwaitGreeting,
    AwaitMethods { count: u8 },
    AwaitRequest,
    AwaitAddress { addr_type: u8 },
    Dialing { target: AddressSpec },
    Relaying { target: AddressSpec, remote: R },
}

impl<R> Phase<R> {
    fn state(&self) -> SessionState {
        match self {
            Phase::AwaitGreeting => SessionState::AwaitGreeting,
            Phase::AwaitMethods { .. } => SessionState::AwaitMethods,
            Phase::AwaitRequest => SessionState::AwaitRequest,
            Phase::AwaitAddress { .. } => SessionState::AwaitAddress,
            Phase::Dialing { .. } => SessionState::Dialing,
            Phase::Relaying { .. } => SessionState::Relaying,
        }
    }
}

/// Handshake state machine over a client stream
pub struct HandshakeEngine<'a, S, D> {
    stream: &'a mut S,
    dialer: &'a D,
}

impl<'a, S, D> HandshakeEngine<'a, S, D>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    D: Dialer,
{
    /// Create an engine over a client stream
    pub fn new(stream: &'a mut S, dialer: &'a D) -> Self {
        HandshakeEngine { stream, dialer }
    }

    /// Run the handshake to completion
    ///
    /// `state` is advanced as each phase completes, so on failure it names
    /// the phase that failed. On success the success reply has already
    /// been written and flushed.
    pub async fn run(
        &mut self,
        state: &mut SessionState,
    ) -> Result<Negotiated<D::Stream>, HandshakeError> {
        let mut phase = Phase::AwaitGreeting;

        loop {
            phase = match phase {
                Phase::Relaying { target, remote } => {
                    return Ok(Negotiated { target, remote });
                }
                current => self.step(current).await?,
            };

            let advanced = state.advance(phase.state());
            debug_assert!(advanced.is_ok(), "handshake moved backwards");
        }
    }

    async fn step(&mut self, phase: Phase<D::Stream>) -> Result<Phase<D::Stream>, HandshakeError> {
        match phase {
            Phase::AwaitGreeting => self.read_greeting().await,
            Phase::AwaitMethods { count } => self.negotiate_method(count).await,
            Phase::AwaitRequest => self.read_request().await,
            Phase::AwaitAddress { addr_type } => {
                let target = decode_address_with_type(&mut *self.stream, addr_type).await?;
                Ok(Phase::Dialing { target })
            }
            Phase::Dialing { target } => self.dial(target).await,
            relaying @ Phase::Relaying { .. } => Ok(relaying),
        }
    }

    /// VER NMETHODS
    async fn read_greeting(&mut self) -> Result<Phase<D::Stream>, HandshakeError> {
        let mut header = [0u8; 2];
        self.stream.read_exact(&mut header).await?;

        let version = header[0];
        if version != SOCKS5_VERSION {
            return Err(HandshakeError::UnsupportedVersion(version));
        }

        Ok(Phase::AwaitMethods { count: header[1] })
    }

    /// Discard the offered methods and select no-auth
    async fn negotiate_method(&mut self, count: u8) -> Result<Phase<D::Stream>, HandshakeError> {
        let mut methods = vec![0u8; count as usize];
        self.stream.read_exact(&mut methods).await?;

        if !methods.contains(&SOCKS5_AUTH_METHOD_NONE) {
            debug!("Client did not offer no-auth ({:?}), selecting it anyway", methods);
        }

        self.stream
            .write_all(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE])
            .await?;
        self.stream.flush().await?;

        Ok(Phase::AwaitRequest)
    }

    /// VER CMD RSV ATYP
    async fn read_request(&mut self) -> Result<Phase<D::Stream>, HandshakeError> {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header).await?;

        let version = header[0];
        let cmd_byte = header[1];
        let addr_type = header[3];

        if version != SOCKS5_VERSION {
            return Err(HandshakeError::UnsupportedVersion(version));
        }

        match SocksCommand::from_byte(cmd_byte) {
            Some(SocksCommand::Connect) => Ok(Phase::AwaitAddress { addr_type }),
            Some(command) => {
                warn!("{} command not supported", command);
                Err(HandshakeError::CommandNotSupported(cmd_byte))
            }
            None => {
                warn!("Unknown command: {:#04x}", cmd_byte);
                Err(HandshakeError::CommandNotSupported(cmd_byte))
            }
        }
    }

    async fn dial(&mut self, target: AddressSpec) -> Result<Phase<D::Stream>, HandshakeError> {
        info!("Connecting to {}", target);

        let remote = self.dialer.connect(&target).await.map_err(|e| {
            warn!("Connection to {} failed: {}", target, e);
            e
        })?;

        write_reply(&mut *self.stream, ReplyCode::Succeeded).await?;

        debug!("Tunnel established to {}", target);
        Ok(Phase::Relaying { target, remote })
    }
}
