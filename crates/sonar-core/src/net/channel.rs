use super::socket::IcmpSocket;
use super::{Channel, DatagramHandler, Network};
use crate::error::{IoError, IoOperation, ProbeError, Result};
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::task::JoinHandle;
use tracing::instrument;

/// The maximum datagram size we read.
const MAX_DATAGRAM_SIZE: usize = 1500;

/// How long the reader pauses after a failed read.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A [`Network`] of raw `ICMPv4` sockets.
///
/// Opening a raw socket requires elevated privileges (`CAP_NET_RAW` on Linux).
#[derive(Debug, Clone, Copy, Default)]
pub struct IcmpNetwork;

impl Network for IcmpNetwork {
    type Channel = IcmpChannel;

    fn open(&self, on_datagram: DatagramHandler) -> Result<IcmpChannel> {
        IcmpChannel::open(on_datagram)
    }
}

/// A raw `ICMPv4` socket registered with the Tokio reactor.
///
/// A reader task invokes the datagram handler for every inbound datagram
/// until the channel is closed.
pub struct IcmpChannel {
    socket: Option<Arc<AsyncFd<IcmpSocket>>>,
    reader: Option<JoinHandle<()>>,
}

impl IcmpChannel {
    #[instrument(skip_all, level = "debug")]
    fn open(on_datagram: DatagramHandler) -> Result<Self> {
        let socket = IcmpSocket::new()?;
        // SAFETY: the socket owns its descriptor, which stays open until the
        // `AsyncFd` is dropped.
        #[allow(unsafe_code)]
        let socket = unsafe { AsyncFd::register_with_interest(socket, Interest::READABLE) }
            .map_err(|err| IoError(io::Error::from(err), IoOperation::RegisterReactor))?;
        let socket = Arc::new(socket);
        let reader = tokio::spawn(read_loop(Arc::clone(&socket), on_datagram));
        tracing::debug!("channel open");
        Ok(Self {
            socket: Some(socket),
            reader: Some(reader),
        })
    }
}

impl Channel for IcmpChannel {
    fn send(&mut self, packet: &[u8], addr: Ipv4Addr) -> std::result::Result<(), ProbeError> {
        let Some(socket) = &self.socket else {
            return Err(ProbeError::RequestFailed(None));
        };
        socket.get_ref().send_to(packet, addr).map_err(|err| {
            let probe_err = ProbeError::from_send(&err);
            tracing::debug!(error = %IoError(err, IoOperation::SendTo), ?probe_err);
            probe_err
        })
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if self.socket.take().is_some() {
            tracing::debug!("channel closed");
        }
    }
}

impl Drop for IcmpChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop(socket: Arc<AsyncFd<IcmpSocket>>, on_datagram: DatagramHandler) {
    let mut buf = [0_u8; MAX_DATAGRAM_SIZE];
    loop {
        let mut guard = match socket.readable().await {
            Ok(guard) => guard,
            Err(err) => {
                tracing::error!(error = %IoError(err, IoOperation::Read), "reader stopped");
                return;
            }
        };
        match guard.try_io(|inner| inner.get_ref().read(&mut buf)) {
            Ok(Ok(len)) => on_datagram(&buf[..len]),
            Ok(Err(err)) => {
                if let Some(backoff) = read_error_backoff(&err) {
                    drop(guard);
                    tracing::error!(error = %IoError(err, IoOperation::Read), ?backoff);
                    tokio::time::sleep(backoff).await;
                }
            }
            Err(_would_block) => {}
        }
    }
}

/// How long to pause after a failed read, if at all.
fn read_error_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::Interrupted => None,
        _ => Some(READ_ERROR_BACKOFF),
    }
}
