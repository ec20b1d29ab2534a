use crate::error::ProbeError;
use crate::types::{Identifier, Sequence};
use sonar_packet::ipv4::Ipv4Packet;
use std::net::Ipv4Addr;
use std::time::Duration;

/// The outcome of a single probe.
///
/// Exactly one `Response` is published per probe, whether it succeeded,
/// timed out or received an invalid reply.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Response {
    pub identifier: Identifier,
    pub resolved_address: Option<Ipv4Addr>,
    pub sequence: Sequence,
    pub round_trip_time: Option<Duration>,
    pub error: Option<ProbeError>,
    pub byte_count: Option<usize>,
    pub ip_header: Option<Ipv4Header>,
}

impl Response {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The `IPv4` header of a received echo reply.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Ipv4Header {
    pub version: u8,
    /// Header length in bytes, including options.
    pub header_length: usize,
    pub type_of_service: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags_and_fragment_offset: u16,
    pub time_to_live: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl From<&Ipv4Packet<'_>> for Ipv4Header {
    fn from(packet: &Ipv4Packet<'_>) -> Self {
        Self {
            version: packet.get_version(),
            header_length: packet.header_len_bytes(),
            type_of_service: packet.get_tos(),
            total_length: packet.get_total_length(),
            identification: packet.get_identification(),
            flags_and_fragment_offset: packet.get_flags_and_fragment_offset(),
            time_to_live: packet.get_ttl(),
            protocol: packet.get_protocol().id(),
            checksum: packet.get_checksum(),
            source: packet.get_source(),
            destination: packet.get_destination(),
        }
    }
}
