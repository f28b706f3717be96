//! SOCKS5 address codec
//!
//! Decodes the ATYP-tagged address that follows a request header and
//! encodes the fixed-shape reply message.

use super::consts::*;
use super::types::{AddressSpec, ReplyCode};
use crate::error::DecodeError;
use std::net::{Ipv4Addr, Ipv6Addr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Decode a tagged address from the stream
///
/// Reads the ATYP byte, then the address and the port:
///
/// ```text
/// +------+----------+----------+
/// | ATYP | DST.ADDR | DST.PORT |
/// +------+----------+----------+
/// |  1   | Variable |    2     |
/// +------+----------+----------+
/// ```
pub async fn decode_address<R>(reader: &mut R) -> Result<AddressSpec, DecodeError>
where
    R: AsyncRead + Unpin,
{
    let addr_type = reader.read_u8().await?;
    decode_address_with_type(reader, addr_type).await
}

/// Decode the address body once the ATYP byte has already been consumed
pub async fn decode_address_with_type<R>(
    reader: &mut R,
    addr_type: u8,
) -> Result<AddressSpec, DecodeError>
where
    R: AsyncRead + Unpin,
{
    match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut addr = [0u8; 4];
            reader.read_exact(&mut addr).await?;
            let port = reader.read_u16().await?;

            Ok(AddressSpec::Ipv4(Ipv4Addr::from(addr), port))
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            // A zero length is accepted here; the dialer rejects it later
            let domain_len = reader.read_u8().await? as usize;

            let mut domain_buf = vec![0u8; domain_len];
            reader.read_exact(&mut domain_buf).await?;
            let port = reader.read_u16().await?;

            let domain = String::from_utf8(domain_buf).map_err(|_| DecodeError::InvalidDomain)?;

            Ok(AddressSpec::Domain(domain, port))
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut addr = [0u8; 16];
            reader.read_exact(&mut addr).await?;
            let port = reader.read_u16().await?;

            Ok(AddressSpec::Ipv6(Ipv6Addr::from(addr), port))
        }

        _ => Err(DecodeError::UnsupportedAddressType(addr_type)),
    }
}

/// Encode a reply message
///
/// The bind address and port are always reported as `0.0.0.0:0`; the
/// outbound socket's local address is not tracked.
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   |    4     |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub fn encode_reply(code: ReplyCode) -> [u8; SOCKS5_REPLY_LEN] {
    let mut reply = [0u8; SOCKS5_REPLY_LEN];
    reply[0] = SOCKS5_VERSION;
    reply[1] = code.into();
    reply[2] = SOCKS5_RESERVED;
    reply[3] = SOCKS5_ADDR_TYPE_IPV4;
    reply
}

/// Write a reply and flush it before returning
pub async fn write_reply<W>(writer: &mut W, code: ReplyCode) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_reply(code)).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_decode_ipv4() {
        let mut cursor = Cursor::new(vec![SOCKS5_ADDR_TYPE_IPV4, 127, 0, 0, 1, 0x1F, 0x90]);

        let addr = decode_address(&mut cursor).await.unwrap();

        assert_eq!(addr.host(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[tokio::test]
    async fn test_decode_domain() {
        let mut data = vec![SOCKS5_ADDR_TYPE_DOMAIN, 5];
        data.extend_from_slice(b"a.com");
        data.extend_from_slice(&443u16.to_be_bytes());
        let mut cursor = Cursor::new(data);

        let addr = decode_address(&mut cursor).await.unwrap();

        assert_eq!(addr, AddressSpec::Domain("a.com".to_string(), 443));
    }

    #[tokio::test]
    async fn test_decode_empty_domain() {
        let mut cursor = Cursor::new(vec![SOCKS5_ADDR_TYPE_DOMAIN, 0, 0x00, 0x50]);

        let addr = decode_address(&mut cursor).await.unwrap();

        assert_eq!(addr.host(), "");
        assert_eq!(addr.port(), 80);
    }

    #[tokio::test]
    async fn test_decode_ipv6() {
        let mut data = vec![SOCKS5_ADDR_TYPE_IPV6];
        data.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        data.extend_from_slice(&80u16.to_be_bytes());
        let mut cursor = Cursor::new(data);

        let addr = decode_address(&mut cursor).await.unwrap();

        assert_eq!(addr, AddressSpec::Ipv6(Ipv6Addr::LOCALHOST, 80));
        assert_eq!(addr.host(), "::1");
    }

    #[tokio::test]
    async fn test_decode_consumes_exactly_the_address() {
        let mut cursor = Cursor::new(vec![SOCKS5_ADDR_TYPE_IPV4, 10, 0, 0, 1, 0, 22, 0xAA, 0xBB]);

        decode_address(&mut cursor).await.unwrap();

        assert_eq!(cursor.position(), 7);
    }

    #[tokio::test]
    async fn test_decode_unsupported_type() {
        let mut cursor = Cursor::new(vec![0x02, 1, 2, 3, 4, 0, 80]);

        let result = decode_address(&mut cursor).await;

        assert!(matches!(result, Err(DecodeError::UnsupportedAddressType(0x02))));
    }

    #[tokio::test]
    async fn test_decode_truncated() {
        let truncated = vec![
            vec![],
            vec![SOCKS5_ADDR_TYPE_IPV4, 127, 0],
            vec![SOCKS5_ADDR_TYPE_IPV4, 127, 0, 0, 1, 0x1F],
            vec![SOCKS5_ADDR_TYPE_DOMAIN],
            vec![SOCKS5_ADDR_TYPE_DOMAIN, 5, b'a', b'.'],
            vec![SOCKS5_ADDR_TYPE_IPV6, 0, 0, 0, 0],
        ];

        for data in truncated {
            let mut cursor = Cursor::new(data.clone());
            let result = decode_address(&mut cursor).await;
            assert!(
                matches!(result, Err(DecodeError::Truncated)),
                "input {:?} gave {:?}",
                data,
                result
            );
        }
    }

    #[tokio::test]
    async fn test_decode_invalid_utf8_domain() {
        let mut cursor = Cursor::new(vec![SOCKS5_ADDR_TYPE_DOMAIN, 2, 0xFF, 0xFE, 0, 80]);

        let result = decode_address(&mut cursor).await;

        assert!(matches!(result, Err(DecodeError::InvalidDomain)));
    }

    #[test]
    fn test_encode_reply_is_zero_filled() {
        assert_eq!(
            encode_reply(ReplyCode::Succeeded),
            [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            encode_reply(ReplyCode::HostUnreachable),
            [0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(encode_reply(ReplyCode::GeneralFailure)[1], 0x01);
        assert_eq!(encode_reply(ReplyCode::CommandNotSupported)[1], 0x07);
    }

    #[tokio::test]
    async fn test_reply_ignores_decoded_target() {
        let mut cursor = Cursor::new(vec![SOCKS5_ADDR_TYPE_IPV4, 192, 168, 1, 1, 0x1F, 0x90]);
        let _addr = decode_address(&mut cursor).await.unwrap();

        let mut buffer = Vec::new();
        write_reply(&mut buffer, ReplyCode::Succeeded).await.unwrap();

        assert_eq!(&buffer[4..], &[0, 0, 0, 0, 0, 0]);
    }
}
