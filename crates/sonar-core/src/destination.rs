use crate::error::Result;
use crate::resolver::{self, Resolver, SystemResolver};
use std::fmt::{Display, Formatter};
use std::net::{Ipv4Addr, SocketAddrV4};

/// The host being pinged and the `IPv4` address it resolved to.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Destination {
    host: String,
    address: Ipv4Addr,
}

impl Destination {
    #[must_use]
    pub fn new(host: impl Into<String>, address: Ipv4Addr) -> Self {
        Self {
            host: host.into(),
            address,
        }
    }

    /// Resolve `host` with the system resolver.
    ///
    /// A dotted-quad literal is used directly without a lookup.
    pub fn resolve(host: &str) -> Result<Self> {
        Self::resolve_with(&SystemResolver, host)
    }

    /// Resolve `host` with the given resolver.
    pub fn resolve_with(resolver: &impl Resolver, host: &str) -> Result<Self> {
        let address = resolver::resolve(resolver, host)?;
        Ok(Self::new(host, address))
    }

    /// A destination for a known address, named after the address itself.
    #[must_use]
    pub fn from_ipv4(address: Ipv4Addr) -> Self {
        Self::new(address.to_string(), address)
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// The raw socket address; the port is meaningless for `ICMP` and is always zero.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, 0)
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.host == self.address.to_string() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} ({})", self.host, self.address)
        }
    }
}
