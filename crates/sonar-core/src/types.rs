use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;

/// Length of the correlation token carried as the echo payload.
pub const TOKEN_LEN: usize = 16;

/// `Identifier` newtype.
///
/// Chosen once per [`Pinger`](crate::Pinger) and carried in every echo request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct Identifier(pub u16);

impl Identifier {
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }
}

/// `Sequence` number newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct Sequence(pub u16);

impl Sequence {
    /// The next sequence number.
    ///
    /// Wraps from `u16::MAX` to `1`; `0` is only ever used for the first probe.
    #[must_use]
    pub const fn next(self) -> Self {
        match self.0.checked_add(1) {
            Some(next) => Self(next),
            None => Self(1),
        }
    }
}

/// `Token` newtype.
///
/// Random bytes chosen once per [`Pinger`](crate::Pinger) and sent as the echo
/// payload, used to tell our replies apart from other `ICMP` traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Token(pub [u8; TOKEN_LEN]);

impl Token {
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                write!(f, "-")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// `MaxProbes` newtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Ord, PartialOrd)]
pub struct MaxProbes(pub NonZeroUsize);
