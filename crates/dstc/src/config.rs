//! Runtime configuration, builder-style.

use std::net::{Ipv4Addr, SocketAddr};

use dstc_timing::Duration;
use dstc_transport::{DEFAULT_GROUP_ADDR, DEFAULT_GROUP_PORT};

/// Default capacity shared by all three symbol tables.
pub const DEFAULT_TABLE_CAPACITY: usize = 128;

/// Default announce interval for the discovery beacon.
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_millis(200);

/// Default MTU-safe outbound packet size.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1400;

#[derive(Clone, Debug)]
pub struct Config {
    /// Explicit node id override; random by default.
    pub node_id: Option<u64>,
    pub group_addr: Ipv4Addr,
    pub group_port: u16,
    /// Fixed, well-known port all nodes bind and multicast-join for presence
    /// beacons. Must match across the group; defaults to `group_port + 1`.
    pub beacon_port: u16,
    /// `0.0.0.0:0` binds an OS-assigned ephemeral control port.
    pub control_bind_addr: SocketAddr,
    pub local_capacity: usize,
    pub callback_capacity: usize,
    pub remote_capacity: usize,
    pub announce_interval: Duration,
    pub max_packet_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: None,
            group_addr: DEFAULT_GROUP_ADDR,
            group_port: DEFAULT_GROUP_PORT,
            beacon_port: DEFAULT_GROUP_PORT + 1,
            control_bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            local_capacity: DEFAULT_TABLE_CAPACITY,
            callback_capacity: DEFAULT_TABLE_CAPACITY,
            remote_capacity: DEFAULT_TABLE_CAPACITY,
            announce_interval: DEFAULT_ANNOUNCE_INTERVAL,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_node_id(mut self, node_id: u64) -> Self {
        self.node_id = Some(node_id);
        self
    }

    #[must_use]
    pub fn with_group(mut self, addr: Ipv4Addr, port: u16) -> Self {
        self.group_addr = addr;
        self.group_port = port;
        self
    }

    #[must_use]
    pub fn with_control_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.control_bind_addr = addr;
        self
    }

    #[must_use]
    pub fn with_beacon_port(mut self, port: u16) -> Self {
        self.beacon_port = port;
        self
    }

    #[must_use]
    pub fn with_table_capacities(mut self, local: usize, callback: usize, remote: usize) -> Self {
        self.local_capacity = local;
        self.callback_capacity = callback;
        self.remote_capacity = remote;
        self
    }

    #[must_use]
    pub fn with_announce_interval(mut self, interval: Duration) -> Self {
        self.announce_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }
}
