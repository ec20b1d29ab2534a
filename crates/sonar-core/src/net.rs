use crate::error::{ProbeError, Result};
use std::net::Ipv4Addr;
use std::sync::Arc;

/// The raw socket `ICMP` network.
#[cfg(unix)]
pub mod channel;

#[cfg(unix)]
mod socket;

/// Invoked with every datagram received on a [`Channel`].
///
/// The bytes include the leading `IPv4` header.
pub type DatagramHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// An open `ICMP` channel.
#[cfg_attr(test, mockall::automock)]
pub trait Channel: Send + 'static {
    /// Send an `ICMP` message to `addr` without blocking.
    fn send(&mut self, packet: &[u8], addr: Ipv4Addr) -> std::result::Result<(), ProbeError>;

    /// Stop delivering datagrams and release the socket.
    ///
    /// Calling `close` more than once has no further effect.
    fn close(&mut self);
}

/// A factory for [`Channel`]s.
pub trait Network: Send + Sync + 'static {
    type Channel: Channel;

    /// Open a channel which invokes `on_datagram` for every inbound datagram.
    ///
    /// Must be called from within a Tokio runtime.
    fn open(&self, on_datagram: DatagramHandler) -> Result<Self::Channel>;
}
