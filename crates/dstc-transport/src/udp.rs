use std::{
    cell::RefCell,
    collections::VecDeque,
    io,
    net::{Ipv4Addr, SocketAddr},
    rc::Rc,
};

use dstc_timing::{Duration, Instant};
use dstc_utils::fatal;
use indexmap::IndexMap;
use mio::{Interest, net::UdpSocket};
use tracing::{debug, trace, warn};

use crate::{
    contract::{CONTROL_KIND_ADVERTISE, DispatchReadyPacket, PubTransport, SubTransport},
    reactor::{EventTag, Reactor},
};

/// Default multicast endpoint, per the wire format the core assumes.
pub const DEFAULT_GROUP_ADDR: Ipv4Addr = Ipv4Addr::new(239, 40, 41, 42);
pub const DEFAULT_GROUP_PORT: u16 = 4723;
const DEFAULT_MAX_PACKET_SIZE: usize = 1400;
const ANNOUNCE_INTERVAL: Duration = Duration::from_millis(200);

/// Configuration for the reference UDP-multicast transport. `node_id` is
/// shared by the pub and sub halves so the sub side can detect and drop
/// loopback of its own multicast sends.
#[derive(Clone, Debug)]
pub struct UdpConfig {
    pub node_id: u64,
    pub group_addr: Ipv4Addr,
    pub group_port: u16,
    /// Fixed, well-known port all nodes join for presence beacons. Distinct
    /// from `group_port` (data) and from each node's own (possibly
    /// ephemeral) unicast control port, since a multicast rendezvous channel
    /// needs every participant bound to the *same* port to receive each
    /// other's sends.
    pub beacon_port: u16,
    /// Bind address for this node's own unicast control socket, over which
    /// it both sends and receives direct advertise messages
    /// (`write_control_message_by_node_id`). `0.0.0.0:0` picks an
    /// OS-assigned ephemeral port, which is how two nodes can coexist on one
    /// host in tests.
    pub control_bind_addr: SocketAddr,
    pub max_packet_size: usize,
    pub announce_interval: Duration,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            node_id: rand_node_id(),
            group_addr: DEFAULT_GROUP_ADDR,
            group_port: DEFAULT_GROUP_PORT,
            beacon_port: DEFAULT_GROUP_PORT + 1,
            control_bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            announce_interval: ANNOUNCE_INTERVAL,
        }
    }
}

/// Generates a node id the way `UdpConfig::default` does, exposed so callers
/// building a partially-overridden `UdpConfig` can still get a random id for
/// the fields they leave unset.
pub fn rand_node_id() -> u64 {
    use std::{
        collections::hash_map::RandomState,
        hash::{BuildHasher, Hasher},
    };
    RandomState::new().build_hasher().finish()
}

struct PeerInfo {
    control_addr: SocketAddr,
}

struct Inner {
    node_id: u64,
    data_socket: UdpSocket,
    beacon_socket: UdpSocket,
    control_socket: UdpSocket,
    group_data_addr: SocketAddr,
    group_beacon_addr: SocketAddr,
    max_packet_size: usize,
    peers: IndexMap<u64, PeerInfo>,
    dispatch_ready: VecDeque<DispatchReadyPacket>,
    rx_buf: Vec<u8>,
    pending_sends: VecDeque<Vec<u8>>,
    announce_interval: Duration,
    next_beacon_due: Instant,
}

/// Joins `socket` to `group`. mio's `join_multicast_v4` wraps the
/// `IP_ADD_MEMBERSHIP` setsockopt call directly.
fn join_group(socket: &UdpSocket, group: Ipv4Addr) -> io::Result<()> {
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
}

impl Inner {
    fn new(config: UdpConfig) -> io::Result<Self> {
        let data_bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.group_port));
        let data_socket = UdpSocket::bind(data_bind)?;
        join_group(&data_socket, config.group_addr)?;

        let beacon_bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.beacon_port));
        let beacon_socket = UdpSocket::bind(beacon_bind)?;
        join_group(&beacon_socket, config.group_addr)?;

        let control_socket = UdpSocket::bind(config.control_bind_addr)?;

        Ok(Self {
            node_id: config.node_id,
            data_socket,
            beacon_socket,
            control_socket,
            group_data_addr: SocketAddr::from((config.group_addr, config.group_port)),
            group_beacon_addr: SocketAddr::from((config.group_addr, config.beacon_port)),
            max_packet_size: config.max_packet_size,
            peers: IndexMap::new(),
            dispatch_ready: VecDeque::new(),
            rx_buf: vec![0u8; 64 * 1024],
            pending_sends: VecDeque::new(),
            announce_interval: config.announce_interval,
            next_beacon_due: Instant::now() + config.announce_interval,
        })
    }

    fn control_port(&self) -> u16 {
        self.control_socket.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    fn send_beacon(&mut self) {
        let control_port = self.control_port();
        let mut buf = Vec::with_capacity(8 + 2);
        buf.extend_from_slice(&self.node_id.to_le_bytes());
        buf.extend_from_slice(&control_port.to_le_bytes());
        if let Err(e) = self.beacon_socket.send_to(&buf, self.group_beacon_addr) {
            warn!("failed to send discovery beacon: {e}");
        }
    }

    fn drain_data_socket(&mut self) {
        loop {
            match self.data_socket.recv_from(&mut self.rx_buf) {
                Ok((len, _peer)) => {
                    if len < 8 {
                        debug!("dropping undersized multicast datagram ({len} bytes)");
                        continue;
                    }
                    let sender = u64::from_le_bytes(self.rx_buf[0..8].try_into().unwrap());
                    if sender == self.node_id {
                        trace!("dropping looped-back multicast datagram from self");
                        continue;
                    }
                    self.dispatch_ready.push_back((sender, self.rx_buf[..len].to_vec()));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("data socket read error: {e}");
                    break;
                }
            }
        }
    }

    fn drain_beacon_socket(&mut self, on_subscription_complete: &mut dyn FnMut(u64)) {
        loop {
            let (len, peer_ip_addr) = match self.beacon_socket.recv_from(&mut self.rx_buf) {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("beacon socket read error: {e}");
                    break;
                }
            };
            let body = self.rx_buf[..len].to_vec();
            self.handle_beacon(&body, peer_ip_addr, on_subscription_complete);
        }
    }

    fn handle_beacon(
        &mut self,
        body: &[u8],
        peer_ip_addr: SocketAddr,
        on_subscription_complete: &mut dyn FnMut(u64),
    ) {
        if body.len() < 10 {
            debug!("malformed beacon, dropping");
            return;
        }
        let peer_node_id = u64::from_le_bytes(body[0..8].try_into().unwrap());
        if peer_node_id == self.node_id {
            return;
        }
        let peer_control_port = u16::from_le_bytes(body[8..10].try_into().unwrap());
        let control_addr = SocketAddr::new(peer_ip_addr.ip(), peer_control_port);

        match self.peers.get_mut(&peer_node_id) {
            Some(info) => info.control_addr = control_addr,
            None => {
                self.peers.insert(peer_node_id, PeerInfo { control_addr });
                debug!(peer = peer_node_id, %control_addr, "discovered new peer via beacon");
                on_subscription_complete(peer_node_id);
            }
        }
    }

    fn drain_control_socket(&mut self, on_advertisement: &mut dyn FnMut(u64, &[u8])) {
        loop {
            let (len, _peer_addr) = match self.control_socket.recv_from(&mut self.rx_buf) {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("control socket read error: {e}");
                    break;
                }
            };
            if len == 0 {
                continue;
            }
            let kind = self.rx_buf[0];
            let body = &self.rx_buf[1..len];
            match kind {
                CONTROL_KIND_ADVERTISE => self.handle_advertise(body, on_advertisement),
                other => debug!("ignoring unknown control message kind {other}"),
            }
        }
    }

    fn handle_advertise(&mut self, body: &[u8], on_advertisement: &mut dyn FnMut(u64, &[u8])) {
        let Some(nul) = body.iter().position(|&b| b == 0) else {
            debug!("advertise control message missing NUL terminator, dropping");
            return;
        };
        let (name, sender_bytes) = (&body[..nul], &body[nul + 1..]);
        if sender_bytes.len() < 8 {
            debug!("advertise control message missing sender node id, dropping");
            return;
        }
        let sender = u64::from_le_bytes(sender_bytes[..8].try_into().unwrap());
        on_advertisement(sender, name);
    }

    fn flush_pending_sends(&mut self) {
        while let Some(buf) = self.pending_sends.front() {
            match self.data_socket.send_to(buf, self.group_data_addr) {
                Ok(_) => {
                    self.pending_sends.pop_front();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("dropping outbound datagram after send error: {e}");
                    self.pending_sends.pop_front();
                }
            }
        }
    }
}

/// Publisher-side handle over the shared UDP transport state.
pub struct UdpPubTransport(Rc<RefCell<Inner>>);

/// Subscriber-side handle over the shared UDP transport state.
pub struct UdpSubTransport(Rc<RefCell<Inner>>);

/// Binds the reference transport and registers its sockets with `reactor`,
/// occupying connection-index slots `DATA = 0`, `BEACON = 1`, `CONTROL = 2`.
pub fn bind(
    config: UdpConfig,
    reactor: &mut Reactor,
) -> io::Result<(UdpPubTransport, UdpSubTransport)> {
    let mut inner = Inner::new(config)?;
    // Read-only interest: a level-triggered facility would report a UDP
    // socket with free send-buffer space as perpetually writable, starving
    // `reactor.wait`'s timeout. `send_to` almost never blocks for a datagram
    // socket in practice, so pending sends are retried opportunistically
    // from `queue_packet` and from the event loop's per-turn call to
    // `write`, rather than from a reactor-reported write event.
    reactor.add(EventTag::new(true, 0), &mut inner.data_socket, Interest::READABLE);
    reactor.add(EventTag::new(false, 1), &mut inner.beacon_socket, Interest::READABLE);
    reactor.add(EventTag::new(false, 2), &mut inner.control_socket, Interest::READABLE);
    let shared = Rc::new(RefCell::new(inner));
    Ok((UdpPubTransport(shared.clone()), UdpSubTransport(shared)))
}

impl PubTransport for UdpPubTransport {
    fn node_id(&self) -> u64 {
        self.0.borrow().node_id
    }

    fn queue_packet(&mut self, buf: Vec<u8>) -> io::Result<()> {
        let mut inner = self.0.borrow_mut();
        if buf.len() > inner.max_packet_size {
            fatal!(
                "outbound packet of {} bytes exceeds configured max_packet_size {}",
                buf.len(),
                inner.max_packet_size
            );
        }
        if !inner.pending_sends.is_empty() {
            inner.flush_pending_sends();
        }
        if inner.pending_sends.is_empty() {
            match inner.data_socket.send_to(&buf, inner.group_data_addr) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
        }
        inner.pending_sends.push_back(buf);
        Ok(())
    }

    fn write(&mut self, _reactor: &mut Reactor) -> io::Result<()> {
        self.0.borrow_mut().flush_pending_sends();
        Ok(())
    }

    fn next_deadline_us(&self) -> Option<i64> {
        let inner = self.0.borrow();
        let micros = inner.next_beacon_due.as_delta_nanos().0 / 1_000;
        Some(i64::try_from(micros).unwrap_or(i64::MAX))
    }

    fn process_timeout(&mut self) {
        let mut inner = self.0.borrow_mut();
        if Instant::now() >= inner.next_beacon_due {
            inner.send_beacon();
            inner.next_beacon_due = Instant::now() + inner.announce_interval;
        }
    }

    fn socket_count(&self) -> usize {
        3
    }
}

impl SubTransport for UdpSubTransport {
    fn node_id(&self) -> u64 {
        self.0.borrow().node_id
    }

    fn read(
        &mut self,
        _reactor: &mut Reactor,
        on_subscription_complete: &mut dyn FnMut(u64),
        on_advertisement: &mut dyn FnMut(u64, &[u8]),
    ) {
        let mut inner = self.0.borrow_mut();
        inner.drain_data_socket();
        inner.drain_beacon_socket(on_subscription_complete);
        inner.drain_control_socket(on_advertisement);
    }

    fn take_next_dispatch_ready(&mut self) -> Option<DispatchReadyPacket> {
        self.0.borrow_mut().dispatch_ready.pop_front()
    }

    fn next_deadline_us(&self) -> Option<i64> {
        None
    }

    fn process_timeout(&mut self) {}

    fn write_control_message_by_node_id(&mut self, node_id: u64, buf: &[u8]) -> io::Result<()> {
        let inner = self.0.borrow();
        let Some(peer) = inner.peers.get(&node_id) else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "unknown peer node id"));
        };
        inner.control_socket.send_to(buf, peer.control_addr).map(|_| ())
    }
}
