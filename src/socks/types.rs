//! SOCKS5 type definitions
//!
//! Defines the core types used while negotiating a session: the decoded
//! target address, the request command, the reply code and the session
//! lifecycle state.

use super::consts::*;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - rejected with CommandNotSupported
    Bind,
    /// UDP ASSOCIATE - rejected with CommandNotSupported
    UdpAssociate,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Some(SocksCommand::UdpAssociate),
            _ => None,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// Wire-decoded target address
///
/// Exactly one address form is carried, together with the destination
/// port. Domain names are kept verbatim (possibly empty) and are only
/// resolved by the dialer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSpec {
    /// IPv4 address with port
    Ipv4(Ipv4Addr, u16),
    /// Domain name with port
    Domain(String, u16),
    /// IPv6 address with port
    Ipv6(Ipv6Addr, u16),
}

impl AddressSpec {
    /// Canonical host string (no brackets around IPv6)
    pub fn host(&self) -> String {
        match self {
            AddressSpec::Ipv4(ip, _) => ip.to_string(),
            AddressSpec::Domain(domain, _) => domain.clone(),
            AddressSpec::Ipv6(ip, _) => ip.to_string(),
        }
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            AddressSpec::Ipv4(_, port) | AddressSpec::Domain(_, port) | AddressSpec::Ipv6(_, port) => {
                *port
            }
        }
    }

    /// Get the address type byte for SOCKS5 protocol
    pub fn addr_type(&self) -> u8 {
        match self {
            AddressSpec::Ipv4(..) => SOCKS5_ADDR_TYPE_IPV4,
            AddressSpec::Domain(..) => SOCKS5_ADDR_TYPE_DOMAIN,
            AddressSpec::Ipv6(..) => SOCKS5_ADDR_TYPE_IPV6,
        }
    }

    /// Socket address for literal IP targets, `None` for domain names
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            AddressSpec::Ipv4(ip, port) => Some(SocketAddr::new(IpAddr::V4(*ip), *port)),
            AddressSpec::Ipv6(ip, port) => Some(SocketAddr::new(IpAddr::V6(*ip), *port)),
            AddressSpec::Domain(..) => None,
        }
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::Ipv4(ip, port) => write!(f, "{}:{}", ip, port),
            AddressSpec::Domain(domain, port) => write!(f, "{}:{}", domain, port),
            AddressSpec::Ipv6(ip, port) => write!(f, "[{}]:{}", ip, port),
        }
    }
}

impl From<SocketAddr> for AddressSpec {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => AddressSpec::Ipv4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => AddressSpec::Ipv6(*v6.ip(), v6.port()),
        }
    }
}

/// Reply status sent to the client in the request-reply message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    /// Command succeeded
    Succeeded = SOCKS5_REPLY_SUCCEEDED,
    /// General SOCKS server failure
    GeneralFailure = SOCKS5_REPLY_GENERAL_FAILURE,
    /// Target could not be reached
    HostUnreachable = SOCKS5_REPLY_HOST_UNREACHABLE,
    /// Command not supported
    CommandNotSupported = SOCKS5_REPLY_COMMAND_NOT_SUPPORTED,
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> Self {
        code as u8
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplyCode::Succeeded => "succeeded",
            ReplyCode::GeneralFailure => "general failure",
            ReplyCode::HostUnreachable => "host unreachable",
            ReplyCode::CommandNotSupported => "command not supported",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle state of a single client session
///
/// Variants are declared in protocol order; a session only ever moves to
/// a later variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SessionState {
    /// Waiting for VER NMETHODS
    #[default]
    AwaitGreeting,
    /// Waiting for the offered method list
    AwaitMethods,
    /// Waiting for VER CMD RSV ATYP
    AwaitRequest,
    /// Waiting for the address and port
    AwaitAddress,
    /// Outbound connection in progress
    Dialing,
    /// Bytes are being forwarded
    Relaying,
    /// Both streams released
    Closed,
}

impl SessionState {
    /// Move to `next`, refusing backward moves and re-entry
    pub fn advance(&mut self, next: SessionState) -> Result<(), SessionState> {
        if next <= *self {
            return Err(*self);
        }
        *self = next;
        Ok(())
    }

    /// True once the session has been torn down
    pub fn is_closed(&self) -> bool {
        *self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
