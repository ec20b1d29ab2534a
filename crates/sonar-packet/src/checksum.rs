//! The Internet checksum (RFC 1071) as used by `IPv4` headers and `ICMPv4` messages.
//!
//! The checksum is the one's complement of the one's complement sum of all
//! 16-bit big-endian words in the message, computed with the checksum field
//! itself treated as zero.

use crate::error::{Error, Result};

/// Index of the checksum word within an `ICMPv4` message.
const ICMP_CHECKSUM_WORD: usize = 1;

/// Index of the checksum word within an `IPv4` header.
const IPV4_CHECKSUM_WORD: usize = 5;

/// Calculate the checksum for an `Ipv4` `ICMP` message.
///
/// The message must be a whole number of 16-bit words; no padding is applied.
pub fn icmp_ipv4_checksum(data: &[u8]) -> Result<u16> {
    checksum(data, ICMP_CHECKSUM_WORD)
}

/// Calculate the checksum for an inbound `Ipv4` `ICMP` message of any length.
///
/// A trailing odd byte is treated as the high byte of a final word padded
/// with zero.
pub fn icmp_ipv4_checksum_padded(data: &[u8]) -> Result<u16> {
    let (words, rest) = data.split_at(data.len() - data.len() % 2);
    let tail = rest
        .first()
        .map_or(0, |&byte| u64::from(u16::from_be_bytes([byte, 0])));
    finalize_checksum(sum_be_words(words, ICMP_CHECKSUM_WORD) + tail)
}

/// Calculate the checksum for an `Ipv4` header.
pub fn ipv4_header_checksum(data: &[u8]) -> Result<u16> {
    checksum(data, IPV4_CHECKSUM_WORD)
}

fn checksum(data: &[u8], ignore_word: usize) -> Result<u16> {
    if data.len() % 2 != 0 {
        return Err(Error::UnexpectedPayloadLength(data.len()));
    }
    finalize_checksum(sum_be_words(data, ignore_word))
}

fn sum_be_words(data: &[u8], ignore_word: usize) -> u64 {
    data.chunks_exact(2)
        .enumerate()
        .filter(|(i, _)| *i != ignore_word)
        .map(|(_, word)| u64::from(u16::from_be_bytes([word[0], word[1]])))
        .sum()
}

fn finalize_checksum(mut sum: u64) -> Result<u16> {
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    u16::try_from(sum)
        .map(|folded| !folded)
        .map_err(|_| Error::ChecksumOutOfRange(sum))
}
