use parking_lot::Mutex;
use sonar_core::{Channel, DatagramHandler, Network, ProbeError, Result};
use sonar_packet::checksum::{icmp_ipv4_checksum_padded, ipv4_header_checksum};
use sonar_packet::icmpv4::{EchoPacket, IcmpCode, IcmpType};
use sonar_packet::ipv4::Ipv4Packet;
use sonar_packet::IpProtocol;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A packet handed to a [`MemoryChannel`].
#[derive(Debug, Clone)]
pub struct Sent {
    pub packet: Vec<u8>,
    pub addr: Ipv4Addr,
}

/// An in-memory network.
///
/// Like raw sockets, every open channel sees every injected datagram.
#[derive(Clone)]
pub struct MemoryNetwork {
    bus: Arc<Mutex<Bus>>,
    sent: mpsc::UnboundedSender<Sent>,
}

#[derive(Default)]
struct Bus {
    next_id: usize,
    handlers: Vec<(usize, DatagramHandler)>,
    send_error: Option<ProbeError>,
}

impl MemoryNetwork {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Sent>) {
        let (sent, rx) = mpsc::unbounded_channel();
        let network = Self {
            bus: Arc::new(Mutex::new(Bus::default())),
            sent,
        };
        (network, rx)
    }

    /// Deliver a datagram to every open channel.
    pub fn inject(&self, datagram: &[u8]) {
        let handlers: Vec<_> = self
            .bus
            .lock()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(datagram);
        }
    }

    /// Fail every subsequent send with `error`.
    pub fn fail_sends(&self, error: Option<ProbeError>) {
        self.bus.lock().send_error = error;
    }

    pub fn open_channels(&self) -> usize {
        self.bus.lock().handlers.len()
    }
}

impl Network for MemoryNetwork {
    type Channel = MemoryChannel;

    fn open(&self, on_datagram: DatagramHandler) -> Result<MemoryChannel> {
        let mut bus = self.bus.lock();
        let id = bus.next_id;
        bus.next_id += 1;
        bus.handlers.push((id, on_datagram));
        Ok(MemoryChannel {
            id,
            bus: Arc::clone(&self.bus),
            sent: self.sent.clone(),
            closed: false,
        })
    }
}

pub struct MemoryChannel {
    id: usize,
    bus: Arc<Mutex<Bus>>,
    sent: mpsc::UnboundedSender<Sent>,
    closed: bool,
}

impl Channel for MemoryChannel {
    fn send(&mut self, packet: &[u8], addr: Ipv4Addr) -> std::result::Result<(), ProbeError> {
        if let Some(err) = self.bus.lock().send_error {
            return Err(err);
        }
        let sent = Sent {
            packet: packet.to_vec(),
            addr,
        };
        self.sent
            .send(sent)
            .map_err(|_| ProbeError::RequestFailed(None))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.bus.lock().handlers.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// An echo reply to `request` from `source`, wrapped in an `IPv4` header.
pub fn reply_to(request: &[u8], source: Ipv4Addr) -> anyhow::Result<Vec<u8>> {
    let request = EchoPacket::new_view(request)?;
    datagram(
        IcmpType::EchoReply,
        request.get_identifier(),
        request.get_sequence(),
        request.payload(),
        source,
    )
}

/// An `ICMP` echo message wrapped in an `IPv4` header.
pub fn datagram(
    icmp_type: IcmpType,
    identifier: u16,
    sequence: u16,
    payload: &[u8],
    source: Ipv4Addr,
) -> anyhow::Result<Vec<u8>> {
    let mut icmp_buf = vec![0_u8; EchoPacket::minimum_packet_size() + payload.len()];
    let mut echo = EchoPacket::new(&mut icmp_buf)?;
    echo.set_icmp_type(icmp_type);
    echo.set_icmp_code(IcmpCode(0));
    echo.set_identifier(identifier);
    echo.set_sequence(sequence);
    echo.set_payload(payload);
    echo.set_checksum(icmp_ipv4_checksum_padded(echo.packet())?);

    let total_length = Ipv4Packet::minimum_packet_size() + icmp_buf.len();
    let mut buf = vec![0_u8; total_length];
    let mut ipv4 = Ipv4Packet::new(&mut buf)?;
    ipv4.set_version(4);
    ipv4.set_header_length(5);
    ipv4.set_total_length(u16::try_from(total_length)?);
    ipv4.set_ttl(64);
    ipv4.set_protocol(IpProtocol::Icmp);
    ipv4.set_source(source);
    ipv4.set_destination(Ipv4Addr::new(10, 0, 0, 1));
    ipv4.set_payload(&icmp_buf);
    let header_len = ipv4.header_len_bytes();
    ipv4.set_checksum(ipv4_header_checksum(&ipv4.packet()[..header_len])?);
    Ok(buf)
}
