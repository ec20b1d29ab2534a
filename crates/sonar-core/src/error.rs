use std::fmt::{Display, Formatter};
use std::io;
use thiserror::Error;

/// A ping engine error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A ping engine error.
///
/// These errors are returned synchronously when resolving a destination,
/// building a [`Pinger`](crate::Pinger) or starting it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("address lookup failed for {0}: {1}")]
    AddressLookupFailed(String, String),
    #[error("no IPv4 address found for {0}")]
    NoIPv4AddressFound(String),
    #[error("unknown resolution failure for {0}: {1}")]
    UnknownResolutionFailure(String, String),
    #[error("failed to set socket options (os error {0})")]
    SocketOptionsFailed(i32),
    #[error("socket is not open")]
    SocketNil,
    #[error("failed to create echo request: {0}")]
    PackageCreationFailed(#[from] sonar_packet::error::Error),
    #[error("invalid config: {0}")]
    BadConfig(String),
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
}

/// A per-probe error.
///
/// Probe errors never stop the [`Pinger`](crate::Pinger); they are delivered
/// as the `error` of a [`Response`](crate::Response).
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProbeError {
    #[error("request failed (os error {0:?})")]
    RequestFailed(Option<i32>),
    #[error("request timed out")]
    RequestTimedOut,
    #[error("invalid length: {0}")]
    InvalidLength(usize),
    #[error("checksum mismatch: received={received:#06x}, calculated={calculated:#06x}")]
    ChecksumMismatch { received: u16, calculated: u16 },
    #[error("invalid type: {0}")]
    InvalidType(u8),
    #[error("invalid code: {0}")]
    InvalidCode(u8),
    #[error("identifier mismatch: received={received}, expected={expected}")]
    IdentifierMismatch { received: u16, expected: u16 },
    #[error("invalid sequence: received={received}, expected={expected}")]
    InvalidSequence { received: u16, expected: u16 },
    #[error("response timeout")]
    ResponseTimeout,
    #[error("unexpected payload length: {0}")]
    UnexpectedPayloadLength(usize),
    #[error("checksum out of range")]
    ChecksumOutOfRange,
    #[error("invalid header offset")]
    InvalidHeaderOffset,
}

impl ProbeError {
    /// Classify a failed non-blocking send.
    pub(crate) fn from_send(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::RequestTimedOut,
            _ => Self::RequestFailed(err.raw_os_error()),
        }
    }
}

impl From<sonar_packet::error::Error> for ProbeError {
    fn from(err: sonar_packet::error::Error) -> Self {
        use sonar_packet::error::Error as PacketError;
        match err {
            PacketError::InsufficientPacketBuffer(_, _, provided) => Self::InvalidLength(provided),
            PacketError::UnexpectedPayloadLength(len) => Self::UnexpectedPayloadLength(len),
            PacketError::ChecksumOutOfRange(_) => Self::ChecksumOutOfRange,
        }
    }
}

/// Custom IO error.
#[derive(Error, Debug)]
#[error("Failed to {1}: {0}")]
pub struct IoError(pub io::Error, pub IoOperation);

impl IoError {
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        self.0.kind()
    }
}

/// Io operation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IoOperation {
    NewSocket,
    SetNonBlocking,
    SetNoSigPipe,
    RegisterReactor,
    SendTo,
    Read,
}

impl Display for IoOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewSocket => write!(f, "create new socket"),
            Self::SetNonBlocking => write!(f, "set non-blocking"),
            Self::SetNoSigPipe => write!(f, "set no SIGPIPE"),
            Self::RegisterReactor => write!(f, "register with reactor"),
            Self::SendTo => write!(f, "send to"),
            Self::Read => write!(f, "read"),
        }
    }
}
