/// A privilege error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[cfg(target_os = "linux")]
    #[error("caps error: {0}")]
    CapsError(#[from] caps::errors::CapsError),
}

/// Whether we may open raw `ICMP` sockets.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Privilege {
    has_privileges: bool,
}

impl Privilege {
    /// Are we running with the privileges required for raw sockets?
    #[must_use]
    pub const fn has_privileges(self) -> bool {
        self.has_privileges
    }

    /// Raise `CAP_NET_RAW` into the effective set if it is permitted.
    #[cfg(target_os = "linux")]
    pub fn acquire() -> Result<Self, Error> {
        use caps::{CapSet, Capability};
        if caps::has_cap(None, CapSet::Permitted, Capability::CAP_NET_RAW)? {
            caps::raise(None, CapSet::Effective, Capability::CAP_NET_RAW)?;
        }
        let has_privileges = caps::has_cap(None, CapSet::Effective, Capability::CAP_NET_RAW)?;
        Ok(Self { has_privileges })
    }

    /// Raw sockets need root outside Linux.
    #[cfg(all(unix, not(target_os = "linux")))]
    #[allow(clippy::unnecessary_wraps)]
    pub fn acquire() -> Result<Self, Error> {
        Ok(Self {
            has_privileges: nix::unistd::Uid::effective().is_root(),
        })
    }

    /// Fail with a helpful message if we cannot open raw sockets.
    pub fn ensure(self) -> anyhow::Result<()> {
        if self.has_privileges {
            Ok(())
        } else if cfg!(target_os = "linux") {
            Err(anyhow::anyhow!(
                "privileges are required (hint: run as root or grant CAP_NET_RAW with `setcap cap_net_raw+p`)"
            ))
        } else {
            Err(anyhow::anyhow!(
                "privileges are required (hint: run as root)"
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure() {
        assert!(Privilege {
            has_privileges: true
        }
        .ensure()
        .is_ok());
        let err = Privilege {
            has_privileges: false
        }
        .ensure()
        .unwrap_err();
        assert!(err.to_string().starts_with("privileges are required"));
    }
}
