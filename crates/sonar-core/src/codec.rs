//! Encoding of echo requests and validation of echo replies.
//!
//! Every request carries the [`Pinger`](crate::Pinger) identifier, the
//! current sequence number and a 16 byte random [`Token`] as its payload:
//!
//! ```text
//! [type:1][code:1][checksum:2][identifier:2][sequence:2][token:16]
//! ```
//!
//! Inbound datagrams from a raw socket are prefixed with their `IPv4` header.
use crate::error::{ProbeError, Result};
use crate::response::Ipv4Header;
use crate::types::{Identifier, Sequence, Token, TOKEN_LEN};
use sonar_packet::checksum::{icmp_ipv4_checksum, icmp_ipv4_checksum_padded};
use sonar_packet::icmpv4::{EchoPacket, IcmpCode, IcmpType};
use sonar_packet::ipv4::Ipv4Packet;
use sonar_packet::IpProtocol;

/// The size of an encoded echo request.
pub const ECHO_PACKET_SIZE: usize = EchoPacket::minimum_packet_size() + TOKEN_LEN;

/// The smallest datagram which can hold one of our echo replies.
pub const MIN_DATAGRAM_SIZE: usize = Ipv4Packet::minimum_packet_size() + ECHO_PACKET_SIZE;

/// Encode an echo request.
pub fn encode(
    identifier: Identifier,
    sequence: Sequence,
    token: &Token,
) -> Result<[u8; ECHO_PACKET_SIZE]> {
    let mut buf = [0_u8; ECHO_PACKET_SIZE];
    let mut echo = EchoPacket::new(&mut buf)?;
    echo.set_icmp_type(IcmpType::EchoRequest);
    echo.set_icmp_code(IcmpCode(0));
    echo.set_identifier(identifier.0);
    echo.set_sequence(sequence.0);
    echo.set_payload(token.as_bytes());
    echo.set_checksum(icmp_ipv4_checksum(echo.packet())?);
    Ok(buf)
}

/// What a valid reply to the in-flight probe must carry.
#[derive(Debug, Clone, Copy)]
pub struct Expected<'a> {
    pub identifier: Identifier,
    pub sequence: Sequence,
    pub token: &'a Token,
}

/// A reply which passed every validation check.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ValidatedReply {
    pub identifier: Identifier,
    pub sequence: Sequence,
    /// The size of the whole datagram, including the `IPv4` header.
    pub byte_count: usize,
    pub ip_header: Ipv4Header,
}

/// Decode and validate an inbound datagram.
///
/// Returns `Ok(None)` for datagrams which do not belong to us: those carrying
/// another token, and our own echo requests looped back on a local interface.
pub fn decode(
    datagram: &[u8],
    expected: &Expected<'_>,
) -> std::result::Result<Option<ValidatedReply>, ProbeError> {
    if datagram.len() < MIN_DATAGRAM_SIZE {
        return Err(ProbeError::InvalidLength(datagram.len()));
    }
    let ipv4 = Ipv4Packet::new_view(datagram)?;
    let offset = icmp_offset(&ipv4)?;
    let icmp = datagram
        .get(offset..)
        .filter(|icmp| icmp.len() >= ECHO_PACKET_SIZE)
        .ok_or(ProbeError::InvalidLength(datagram.len()))?;
    let echo = EchoPacket::new_view(icmp)?;
    let calculated = icmp_ipv4_checksum_padded(icmp)?;
    let received = echo.get_checksum();
    if received != calculated {
        return Err(ProbeError::ChecksumMismatch {
            received,
            calculated,
        });
    }
    if echo.payload()[..TOKEN_LEN] != expected.token.as_bytes()[..] {
        return Ok(None);
    }
    match echo.get_icmp_type() {
        IcmpType::EchoReply => {}
        IcmpType::EchoRequest => return Ok(None),
        IcmpType::Other(id) => return Err(ProbeError::InvalidType(id)),
    }
    let IcmpCode(code) = echo.get_icmp_code();
    if code != 0 {
        return Err(ProbeError::InvalidCode(code));
    }
    let identifier = echo.get_identifier();
    if identifier != expected.identifier.0 {
        return Err(ProbeError::IdentifierMismatch {
            received: identifier,
            expected: expected.identifier.0,
        });
    }
    let sequence = echo.get_sequence();
    if sequence != expected.sequence.0 {
        return Err(ProbeError::InvalidSequence {
            received: sequence,
            expected: expected.sequence.0,
        });
    }
    Ok(Some(ValidatedReply {
        identifier: Identifier(identifier),
        sequence: Sequence(sequence),
        byte_count: datagram.len(),
        ip_header: Ipv4Header::from(&ipv4),
    }))
}

/// The offset of the `ICMP` message within a datagram.
fn icmp_offset(ipv4: &Ipv4Packet<'_>) -> std::result::Result<usize, ProbeError> {
    let header_len = ipv4.header_len_bytes();
    if ipv4.get_version() != 4
        || ipv4.get_protocol() != IpProtocol::Icmp
        || header_len < Ipv4Packet::minimum_packet_size()
    {
        return Err(ProbeError::InvalidHeaderOffset);
    }
    Ok(header_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use std::net::Ipv4Addr;
    use test_case::test_case;

    const ID: Identifier = Identifier(1234);
    const TOKEN: Token = Token(hex!("f0 e1 d2 c3 b4 a5 96 87 78 69 5a 4b 3c 2d 1e 0f"));

    fn expected(sequence: u16) -> Expected<'static> {
        Expected {
            identifier: ID,
            sequence: Sequence(sequence),
            token: &TOKEN,
        }
    }

    fn datagram(icmp_type: u8, code: u8, id: u16, seq: u16, token: &Token) -> Vec<u8> {
        let mut buf = vec![0_u8; MIN_DATAGRAM_SIZE];
        let mut ipv4 = Ipv4Packet::new(&mut buf).unwrap();
        ipv4.set_version(4);
        ipv4.set_header_length(5);
        ipv4.set_total_length(MIN_DATAGRAM_SIZE as u16);
        ipv4.set_ttl(64);
        ipv4.set_protocol(IpProtocol::Icmp);
        ipv4.set_source(Ipv4Addr::LOCALHOST);
        ipv4.set_destination(Ipv4Addr::LOCALHOST);
        let mut echo = EchoPacket::new(&mut buf[20..]).unwrap();
        echo.set_icmp_type(IcmpType::from(icmp_type));
        echo.set_icmp_code(IcmpCode(code));
        echo.set_identifier(id);
        echo.set_sequence(seq);
        echo.set_payload(token.as_bytes());
        echo.set_checksum(icmp_ipv4_checksum(echo.packet()).unwrap());
        buf
    }

    fn reply(seq: u16) -> Vec<u8> {
        datagram(0, 0, ID.0, seq, &TOKEN)
    }

    #[test]
    fn test_encode() -> anyhow::Result<()> {
        let buf = encode(ID, Sequence(10), &Token::default())?;
        assert_eq!(
            hex!("08 00 f3 23 04 d2 00 0a 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00"),
            buf
        );
        Ok(())
    }

    #[test]
    fn test_encode_checksum_verifies() -> anyhow::Result<()> {
        let buf = encode(ID, Sequence(7), &TOKEN)?;
        let echo = EchoPacket::new_view(&buf)?;
        assert_eq!(IcmpType::EchoRequest, echo.get_icmp_type());
        assert_eq!(&TOKEN.0, echo.payload());
        assert_eq!(echo.get_checksum(), icmp_ipv4_checksum(&buf)?);
        Ok(())
    }

    #[test]
    fn test_decode_valid_reply() -> anyhow::Result<()> {
        let buf = reply(3);
        let reply = decode(&buf, &expected(3))?.expect("reply");
        assert_eq!(ID, reply.identifier);
        assert_eq!(Sequence(3), reply.sequence);
        assert_eq!(MIN_DATAGRAM_SIZE, reply.byte_count);
        assert_eq!(4, reply.ip_header.version);
        assert_eq!(20, reply.ip_header.header_length);
        assert_eq!(64, reply.ip_header.time_to_live);
        assert_eq!(1, reply.ip_header.protocol);
        assert_eq!(Ipv4Addr::LOCALHOST, reply.ip_header.source);
        Ok(())
    }

    #[test]
    fn test_decode_with_ip_options() -> anyhow::Result<()> {
        let plain = reply(0);
        let mut buf = vec![0_u8; plain.len() + 4];
        buf[..20].copy_from_slice(&plain[..20]);
        buf[24..].copy_from_slice(&plain[20..]);
        Ipv4Packet::new(&mut buf)?.set_header_length(6);
        let reply = decode(&buf, &expected(0))?.expect("reply");
        assert_eq!(24, reply.ip_header.header_length);
        assert_eq!(MIN_DATAGRAM_SIZE + 4, reply.byte_count);
        Ok(())
    }

    #[test]
    fn test_decode_too_short() {
        let buf = reply(0);
        assert_eq!(
            Err(ProbeError::InvalidLength(MIN_DATAGRAM_SIZE - 1)),
            decode(&buf[..MIN_DATAGRAM_SIZE - 1], &expected(0))
        );
    }

    #[test]
    fn test_decode_options_leave_too_little() -> anyhow::Result<()> {
        let mut buf = reply(0);
        Ipv4Packet::new(&mut buf)?.set_header_length(6);
        assert_eq!(
            Err(ProbeError::InvalidLength(MIN_DATAGRAM_SIZE)),
            decode(&buf, &expected(0))
        );
        Ok(())
    }

    #[test_case(6, 5, IpProtocol::Icmp; "wrong version")]
    #[test_case(4, 5, IpProtocol::Other(17); "wrong protocol")]
    #[test_case(4, 4, IpProtocol::Icmp; "header too short")]
    fn test_decode_invalid_header_offset(
        version: u8,
        header_length: u8,
        protocol: IpProtocol,
    ) -> anyhow::Result<()> {
        let mut buf = reply(0);
        let mut ipv4 = Ipv4Packet::new(&mut buf)?;
        ipv4.set_version(version);
        ipv4.set_header_length(header_length);
        ipv4.set_protocol(protocol);
        assert_eq!(
            Err(ProbeError::InvalidHeaderOffset),
            decode(&buf, &expected(0))
        );
        Ok(())
    }

    #[test]
    fn test_any_mutated_byte_fails_checksum() {
        let original = reply(9);
        for i in Ipv4Packet::minimum_packet_size()..original.len() {
            let mut buf = original.clone();
            buf[i] ^= 0xff;
            let result = decode(&buf, &expected(9));
            assert!(
                matches!(result, Err(ProbeError::ChecksumMismatch { .. })),
                "byte {i}: {result:?}"
            );
        }
    }

    #[test]
    fn test_checksum_mismatch_values() {
        let mut buf = reply(0);
        buf[22] = 0x00;
        buf[23] = 0x01;
        let calculated = icmp_ipv4_checksum(&reply(0)[20..]).unwrap();
        assert_eq!(
            Err(ProbeError::ChecksumMismatch {
                received: 0x0001,
                calculated
            }),
            decode(&buf, &expected(0))
        );
    }

    /// Append a trailing byte and fix up the `ICMP` checksum.
    fn with_trailing_byte(mut buf: Vec<u8>, byte: u8) -> Vec<u8> {
        buf.push(byte);
        let checksum = icmp_ipv4_checksum_padded(&buf[20..]).unwrap();
        EchoPacket::new(&mut buf[20..]).unwrap().set_checksum(checksum);
        buf
    }

    #[test]
    fn test_decode_odd_length_reply() -> anyhow::Result<()> {
        let buf = with_trailing_byte(reply(0), 0xab);
        let reply = decode(&buf, &expected(0))?.expect("reply");
        assert_eq!(MIN_DATAGRAM_SIZE + 1, reply.byte_count);
        Ok(())
    }

    #[test]
    fn test_decode_odd_length_foreign_token_is_not_mine() {
        let other = Token([0xaa; TOKEN_LEN]);
        let buf = with_trailing_byte(datagram(0, 0, 99, 0, &other), 0xab);
        assert_eq!(Ok(None), decode(&buf, &expected(0)));
    }

    #[test]
    fn test_decode_odd_length_checksum_mismatch() {
        let mut buf = with_trailing_byte(reply(0), 0xab);
        let last = buf.len() - 1;
        buf[last] = 0xac;
        assert!(matches!(
            decode(&buf, &expected(0)),
            Err(ProbeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_foreign_token_is_not_mine() {
        let other = Token([0xaa; TOKEN_LEN]);
        let buf = datagram(0, 0, ID.0, 0, &other);
        assert_eq!(Ok(None), decode(&buf, &expected(0)));
    }

    #[test]
    fn test_foreign_token_wins_over_type() {
        let other = Token([0xaa; TOKEN_LEN]);
        let buf = datagram(3, 1, 1, 1, &other);
        assert_eq!(Ok(None), decode(&buf, &expected(0)));
    }

    #[test]
    fn test_own_request_is_not_mine() {
        let buf = datagram(8, 0, ID.0, 0, &TOKEN);
        assert_eq!(Ok(None), decode(&buf, &expected(0)));
    }

    #[test]
    fn test_invalid_type() {
        let buf = datagram(3, 0, ID.0, 0, &TOKEN);
        assert_eq!(Err(ProbeError::InvalidType(3)), decode(&buf, &expected(0)));
    }

    #[test]
    fn test_invalid_code() {
        let buf = datagram(0, 1, ID.0, 0, &TOKEN);
        assert_eq!(Err(ProbeError::InvalidCode(1)), decode(&buf, &expected(0)));
    }

    #[test]
    fn test_identifier_mismatch() {
        let buf = datagram(0, 0, 4321, 0, &TOKEN);
        assert_eq!(
            Err(ProbeError::IdentifierMismatch {
                received: 4321,
                expected: ID.0
            }),
            decode(&buf, &expected(0))
        );
    }

    #[test]
    fn test_invalid_sequence() {
        let buf = reply(1);
        assert_eq!(
            Err(ProbeError::InvalidSequence {
                received: 1,
                expected: 2
            }),
            decode(&buf, &expected(2))
        );
    }

    #[test]
    fn test_checks_are_ordered() {
        let buf = datagram(3, 1, 4321, 5, &TOKEN);
        assert_eq!(Err(ProbeError::InvalidType(3)), decode(&buf, &expected(0)));
        let buf = datagram(0, 1, 4321, 5, &TOKEN);
        assert_eq!(Err(ProbeError::InvalidCode(1)), decode(&buf, &expected(0)));
        let buf = datagram(0, 0, 4321, 5, &TOKEN);
        assert!(matches!(
            decode(&buf, &expected(0)),
            Err(ProbeError::IdentifierMismatch { .. })
        ));
    }
}
