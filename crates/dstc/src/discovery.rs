//! Discovery protocol: on subscription-complete, announce every
//! locally-registered function name to the new peer; on receipt of an
//! advertisement, update the remote-function table.

use dstc_transport::{SubTransport, contract::CONTROL_KIND_ADVERTISE};
use tracing::{info, warn};

use crate::tables::{LocalTable, RemoteTable};

/// One control message per locally-registered name, each prefixed with
/// `CONTROL_KIND_ADVERTISE` and carrying a NUL-terminated name followed by
/// the local node id (so the receiving peer's `register_remote` can also be
/// told who advertised it, matching the reference transport's wire layout in
/// `dstc_transport::udp`).
pub fn announce_to_peer<S: SubTransport>(
    local: &LocalTable,
    sub_transport: &mut S,
    local_node_id: u64,
    peer_node_id: u64,
) {
    info!(peer = peer_node_id, "subscription complete, sending supported functions");
    for name in local.iter() {
        let mut msg = Vec::with_capacity(1 + name.len() + 1 + 8);
        msg.push(CONTROL_KIND_ADVERTISE);
        msg.extend_from_slice(name.as_str().as_bytes());
        msg.push(0);
        msg.extend_from_slice(&local_node_id.to_le_bytes());
        if let Err(e) = sub_transport.write_control_message_by_node_id(peer_node_id, &msg) {
            warn!(peer = peer_node_id, name = %name, "failed to send advertisement: {e}");
        }
    }
}

/// Updates `remote` for one advertisement received from `sender_node_id`.
pub fn on_advertisement(remote: &mut RemoteTable, sender_node_id: u64, name_bytes: &[u8]) {
    match std::str::from_utf8(name_bytes) {
        Ok(name) => {
            info!(peer = sender_node_id, function = name, "remote function advertised");
            remote.register(name);
        }
        Err(_) => warn!(peer = sender_node_id, "advertisement with non-utf8 function name, dropping"),
    }
}
