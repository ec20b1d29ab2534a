use thiserror::Error;

/// A packet error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A packet error.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// Attempting to create a packet with an insufficient buffer size.
    #[error("insufficient buffer for {0} packet, minimum={1}, provided={2}")]
    InsufficientPacketBuffer(&'static str, usize, usize),
    /// Attempting to checksum a buffer which is not a whole number of 16-bit words.
    #[error("unexpected payload length {0}, must be a multiple of 2")]
    UnexpectedPayloadLength(usize),
    /// The folded checksum did not fit in 16 bits.
    #[error("checksum {0:#x} out of range")]
    ChecksumOutOfRange(u64),
}
