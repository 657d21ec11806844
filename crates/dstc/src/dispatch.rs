//! Dispatch pipeline: drains dispatch-ready packets, splits each into
//! frames, resolves name-or-token to a handler, invokes it.

use tracing::warn;

use crate::{
    frame::iter_frames,
    tables::{CallbackTable, LocalTable},
};

/// Walks every frame in `packet` (sent by `sender`) in order, resolving and
/// invoking handlers. Unresolved names/tokens and malformed frames are
/// logged and skipped without aborting the rest of the packet.
pub fn dispatch_packet(
    local: &LocalTable,
    callbacks: &mut CallbackTable,
    sender: u64,
    packet: &[u8],
) {
    for frame in iter_frames(packet) {
        if frame.header.name_len > 0 {
            let name_len = frame.header.name_len as usize;
            if frame.payload.len() < name_len {
                warn!("malformed frame: name_len exceeds payload, dropping frame");
                continue;
            }
            let (name_bytes, args) = frame.payload.split_at(name_len);
            match local.find(name_bytes) {
                Some(handler) => handler(sender, args),
                None => {
                    let name = String::from_utf8_lossy(name_bytes);
                    warn!("function [{name}] not loaded. Ignored");
                }
            }
        } else {
            if frame.payload.len() < 8 {
                warn!("malformed frame: callback payload shorter than an 8-byte token, dropping");
                continue;
            }
            let (token_bytes, args) = frame.payload.split_at(8);
            let token = u64::from_le_bytes(token_bytes.try_into().unwrap());
            match callbacks.find(token) {
                Some(handler) => handler(sender, args),
                None => warn!("callback [{token:#x}] not found. Ignored"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::frame::FrameHeader;

    fn frame_bytes(node_id: u64, name: &str, args: &[u8]) -> Vec<u8> {
        let header = FrameHeader {
            node_id,
            payload_len: (name.len() + args.len()) as u32,
            name_len: name.len() as u16,
        };
        let mut buf = header.encode().to_vec();
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(args);
        buf
    }

    fn callback_frame_bytes(node_id: u64, token: u64, args: &[u8]) -> Vec<u8> {
        let header = FrameHeader { node_id, payload_len: (8 + args.len()) as u32, name_len: 0 };
        let mut buf = header.encode().to_vec();
        buf.extend_from_slice(&token.to_le_bytes());
        buf.extend_from_slice(args);
        buf
    }

    #[test]
    fn dispatches_to_registered_name() {
        let mut local = LocalTable::new(4);
        let callbacks = Arc::new(Mutex::new(Vec::new()));
        let captured = callbacks.clone();
        local.register(
            "print",
            Box::new(move |node_id, args| captured.lock().unwrap().push((node_id, args.to_vec()))),
        );
        let mut cb_table = CallbackTable::new(4);
        let packet = frame_bytes(7, "print", &[0x2a]);
        dispatch_packet(&local, &mut cb_table, 7, &packet);
        assert_eq!(*callbacks.lock().unwrap(), vec![(7, vec![0x2a])]);
    }

    #[test]
    fn unknown_name_is_skipped_without_stopping_the_packet() {
        let local = LocalTable::new(4);
        let mut cb_table = CallbackTable::new(4);
        let hits = Arc::new(AtomicUsize::new(0));
        let mut local_with_known = LocalTable::new(4);
        let hits_clone = hits.clone();
        local_with_known
            .register("print", Box::new(move |_, _| { hits_clone.fetch_add(1, Ordering::SeqCst); }));
        let _ = &local;

        let mut packet = frame_bytes(1, "absent", &[9]);
        packet.extend(frame_bytes(1, "print", &[1]));
        dispatch_packet(&local_with_known, &mut cb_table, 1, &packet);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_fires_once_then_is_dropped() {
        let local = LocalTable::new(4);
        let mut cb_table = CallbackTable::new(4);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let token = cb_table.register(Box::new(move |_, args| {
            assert_eq!(args, &[1, 2]);
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let packet = callback_frame_bytes(1, token, &[1, 2]);
        dispatch_packet(&local, &mut cb_table, 1, &packet);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // second identical delivery: token already consumed, no handler call.
        let packet2 = callback_frame_bytes(1, token, &[1, 2]);
        dispatch_packet(&local, &mut cb_table, 1, &packet2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
