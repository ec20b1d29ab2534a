use crate::error::{IoError, IoOperation, Result};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::{AsRawFd, RawFd};
use tracing::instrument;

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: nix::libc::c_int = nix::libc::MSG_NOSIGNAL;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: nix::libc::c_int = 0;

/// A non-blocking raw `ICMPv4` socket.
#[derive(Debug)]
pub struct IcmpSocket {
    inner: Socket,
}

impl IcmpSocket {
    #[instrument(level = "trace")]
    pub fn new() -> Result<Self> {
        let inner = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(|err| IoError(err, IoOperation::NewSocket))?;
        inner
            .set_nonblocking(true)
            .map_err(|err| IoError(err, IoOperation::SetNonBlocking))?;
        disable_sigpipe(&inner)?;
        Ok(Self { inner })
    }

    #[instrument(skip(self, buf), level = "trace")]
    pub fn send_to(&self, buf: &[u8], addr: Ipv4Addr) -> io::Result<()> {
        let addr = SockAddr::from(SocketAddrV4::new(addr, 0));
        self.inner
            .send_to_with_flags(buf, &addr, SEND_FLAGS)
            .map(|_| ())
    }

    /// Read one datagram, including its `IPv4` header.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.inner).read(buf)
    }
}

impl AsRawFd for IcmpSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn disable_sigpipe(socket: &Socket) -> Result<()> {
    socket.set_nosigpipe(true).map_err(|err| {
        let code = err.raw_os_error().unwrap_or_default();
        tracing::debug!(error = %IoError(err, IoOperation::SetNoSigPipe));
        crate::error::Error::SocketOptionsFailed(code)
    })
}

/// There is no socket option on this platform; `SEND_FLAGS` suppresses the signal per send.
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
#[allow(clippy::unnecessary_wraps)]
fn disable_sigpipe(_socket: &Socket) -> Result<()> {
    Ok(())
}
