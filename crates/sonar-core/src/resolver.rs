use crate::error::{Error, Result};
use dns_lookup::{LookupError, LookupErrorKind};
use std::net::{IpAddr, Ipv4Addr};
use tracing::instrument;

/// Resolve hostnames to candidate addresses.
#[cfg_attr(test, mockall::automock)]
pub trait Resolver {
    /// Look up all addresses for `host`, in the order the resolver returned them.
    fn lookup(&self, host: &str) -> Result<Vec<IpAddr>>;
}

/// A [`Resolver`] backed by the system `getaddrinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    #[instrument(level = "trace")]
    fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        let addrs = dns_lookup::getaddrinfo(Some(host), None, None)
            .map_err(|err| lookup_error(host, &err))?;
        Ok(addrs
            .filter_map(std::result::Result::ok)
            .map(|info| info.sockaddr.ip())
            .collect())
    }
}

/// Resolve `host` to a single `IPv4` address.
///
/// A dotted-quad literal is returned as is. Otherwise the first `IPv4`
/// address returned by `resolver` wins and all other candidates are ignored.
pub fn resolve(resolver: &impl Resolver, host: &str) -> Result<Ipv4Addr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }
    let addrs = resolver.lookup(host)?;
    tracing::debug!(host, ?addrs, "resolved");
    addrs
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(ipv4) => Some(ipv4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| Error::NoIPv4AddressFound(host.to_string()))
}

fn lookup_error(host: &str, err: &LookupError) -> Error {
    match err.kind() {
        LookupErrorKind::NoName | LookupErrorKind::Again | LookupErrorKind::Fail => {
            Error::AddressLookupFailed(host.to_string(), format!("{err:?}"))
        }
        _ => Error::UnknownResolutionFailure(host.to_string(), format!("{err:?}")),
    }
}
