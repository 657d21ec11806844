//! Outbound queueing: builds a framed call and accumulates it into the
//! current outbound packet, handed to the pub transport once it's full or
//! explicitly flushed.
//!
//! Buffers are sized `HEADER_LEN + max(name_len, 8) + arg_len`, fixing a bug
//! where a `name_len == 0` callback call could under-allocate relative to
//! the 8 token bytes actually written. Moot in safe Rust since `Vec` grows
//! as needed, but the sizing is still computed explicitly for documentation
//! clarity.

use crate::frame::{FrameHeader, HEADER_LEN};

/// Builds one framed call addressed by name: `name_len = name.len()`,
/// payload is `name | args`.
pub fn build_name_frame(local_node_id: u64, name: &str, args: &[u8]) -> Vec<u8> {
    let payload_len = name.len() + args.len();
    let header =
        FrameHeader { node_id: local_node_id, payload_len: payload_len as u32, name_len: name.len() as u16 };
    let mut buf = Vec::with_capacity(HEADER_LEN + name.len().max(8) + args.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(args);
    buf
}

/// Builds one framed call addressed by callback token: `name_len = 0`,
/// payload is `token (8 bytes, little-endian) | args`.
pub fn build_callback_frame(local_node_id: u64, token: u64, args: &[u8]) -> Vec<u8> {
    let payload_len = 8 + args.len();
    let header = FrameHeader { node_id: local_node_id, payload_len: payload_len as u32, name_len: 0 };
    let mut buf = Vec::with_capacity(HEADER_LEN + 8 + args.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&token.to_le_bytes());
    buf.extend_from_slice(args);
    buf
}

/// Accumulates framed calls into `outbound` up to `max_packet_size`,
/// flushing through `flush` before a frame that would overflow it so that
/// each transport packet packs as many whole frames as fit: several calls
/// queued within one turn are delivered concatenated in a single packet.
pub fn enqueue_frame(
    outbound: &mut Vec<u8>,
    max_packet_size: usize,
    frame: Vec<u8>,
    mut flush: impl FnMut(Vec<u8>) -> std::io::Result<()>,
) -> std::io::Result<()> {
    if !outbound.is_empty() && outbound.len() + frame.len() > max_packet_size {
        flush(std::mem::take(outbound))?;
    }
    outbound.extend_from_slice(&frame);
    if outbound.len() >= max_packet_size {
        flush(std::mem::take(outbound))?;
    }
    Ok(())
}
