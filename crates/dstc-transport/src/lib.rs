pub mod contract;
pub mod reactor;
mod udp;

pub use contract::{DispatchReadyPacket, PubTransport, SubTransport};
pub use reactor::{EventTag, Reactor};
pub use udp::{
    DEFAULT_GROUP_ADDR, DEFAULT_GROUP_PORT, UdpConfig, UdpPubTransport, UdpSubTransport, bind, rand_node_id,
};
