//! SOCKS5 protocol engine for Sockrelay
//!
//! This module implements the server side of the SOCKS5 CONNECT flow:
//! address decoding, the handshake state machine, the bidirectional relay
//! and the per-connection supervisor that ties them together.

mod codec;
mod consts;
mod handshake;
mod relay;
mod session;
#[cfg(test)]
pub(crate) mod test_util;
mod types;

pub use codec::{decode_address, decode_address_with_type, encode_reply, write_reply};
pub use consts::*;
pub use handshake::{HandshakeEngine, Negotiated};
pub use relay::{RelayEngine, RelayStats};
pub use session::{Session, SessionOutcome};
pub use types::{AddressSpec, ReplyCode, SessionState, SocksCommand};
