//! Error types for Sockrelay
//!
//! This module defines the typed errors raised by the protocol engine and
//! by the process-level collaborators around it.

use crate::socks::ReplyCode;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the listener and process surface
#[derive(Error, Debug)]
pub enum RelayError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Firewall provisioning error
    #[error("Firewall error: {0}")]
    Firewall(String),
}

/// Errors raised while decoding a SOCKS5 address
#[derive(Error, Debug)]
pub enum DecodeError {
    /// ATYP byte is not IPv4, domain or IPv6
    #[error("Unsupported address type: {0}")]
    UnsupportedAddressType(u8),

    /// Stream closed in the middle of a field
    #[error("Address truncated")]
    Truncated,

    /// Domain bytes are not valid UTF-8
    #[error("Invalid domain name")]
    InvalidDomain,

    /// Any other read failure
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Truncated
        } else {
            DecodeError::Io(err)
        }
    }
}

/// Errors raised while dialing the target
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Target host is an empty domain name
    #[error("Empty target host")]
    EmptyHost,

    /// Name resolution failed
    #[error("Failed to resolve {host}: {source}")]
    Resolve {
        /// Host being resolved
        host: String,
        /// Underlying resolver error
        source: io::Error,
    },

    /// Resolver returned nothing
    #[error("No addresses found for {0}")]
    NoAddresses(String),

    /// Connect attempt exceeded the configured timeout
    #[error("Connection to {target} timed out after {after:?}")]
    Timeout {
        /// Target being dialed
        target: String,
        /// Configured timeout
        after: Duration,
    },

    /// Connect attempt failed
    #[error("Failed to connect to {target}: {source}")]
    Io {
        /// Target being dialed
        target: String,
        /// Underlying socket error
        source: io::Error,
    },
}

impl ConnectError {
    /// Reply code reported to the client for this failure
    pub fn reply_code(&self) -> ReplyCode {
        match self {
            ConnectError::EmptyHost
            | ConnectError::Resolve { .. }
            | ConnectError::NoAddresses(_)
            | ConnectError::Timeout { .. } => ReplyCode::HostUnreachable,
            ConnectError::Io { source, .. } => match source.kind() {
                io::ErrorKind::ConnectionRefused
                | io::ErrorKind::TimedOut
                | io::ErrorKind::AddrNotAvailable
                | io::ErrorKind::HostUnreachable
                | io::ErrorKind::NetworkUnreachable => ReplyCode::HostUnreachable,
                _ => ReplyCode::GeneralFailure,
            },
        }
    }
}

/// Failure classes a session can end with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad version byte or malformed field
    ProtocolViolation,
    /// Non-CONNECT command or unknown address type
    UnsupportedFeature,
    /// Dial failure
    TargetUnreachable,
    /// Read/write failure on either stream
    TransportError,
}

/// Outcome of a failed handshake phase
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Version byte other than 5
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Command other than CONNECT
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Address could not be decoded
    #[error("Address decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Target could not be dialed
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Client stream failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl HandshakeError {
    /// Reply to send before closing, `None` to close silently
    pub fn reply_code(&self) -> Option<ReplyCode> {
        match self {
            HandshakeError::UnsupportedVersion(_) | HandshakeError::Io(_) => None,
            HandshakeError::CommandNotSupported(_) => Some(ReplyCode::CommandNotSupported),
            HandshakeError::Decode(DecodeError::Truncated | DecodeError::Io(_)) => None,
            HandshakeError::Decode(_) => Some(ReplyCode::GeneralFailure),
            HandshakeError::Connect(e) => Some(e.reply_code()),
        }
    }

    /// Failure class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            HandshakeError::UnsupportedVersion(_)
            | HandshakeError::Decode(DecodeError::Truncated | DecodeError::InvalidDomain) => {
                ErrorClass::ProtocolViolation
            }
            HandshakeError::CommandNotSupported(_)
            | HandshakeError::Decode(DecodeError::UnsupportedAddressType(_)) => {
                ErrorClass::UnsupportedFeature
            }
            HandshakeError::Connect(_) => ErrorClass::TargetUnreachable,
            HandshakeError::Io(_) | HandshakeError::Decode(DecodeError::Io(_)) => {
                ErrorClass::TransportError
            }
        }
    }
}
