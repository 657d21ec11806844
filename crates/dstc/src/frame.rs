//! Wire framing: layout of one call's header and the rule for walking a
//! stream of concatenated calls packed into a single transport payload.
//!
//! Pinned to explicit little-endian, fixed field widths: no
//! `#[repr(C, packed)]` transmutation of a native-layout struct.

use tracing::warn;

/// `node_id(8) + payload_len(4) + name_len(2)`.
pub const HEADER_LEN: usize = 8 + 4 + 2;

/// Header at the start of each call inside a transport payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub node_id: u64,
    /// Bytes following the header for this call.
    pub payload_len: u32,
    /// Length of the name at the start of the payload; 0 means
    /// callback-by-token.
    pub name_len: u16,
}

impl FrameHeader {
    #[inline]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(&self.node_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[12..14].copy_from_slice(&self.name_len.to_le_bytes());
        buf
    }

    #[inline]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            node_id: u64::from_le_bytes(bytes[0..8].try_into().ok()?),
            payload_len: u32::from_le_bytes(bytes[8..12].try_into().ok()?),
            name_len: u16::from_le_bytes(bytes[12..14].try_into().ok()?),
        })
    }
}

/// One (header, payload) pair decoded from a packet.
#[derive(Debug)]
pub struct Frame<'a> {
    pub header: FrameHeader,
    pub payload: &'a [u8],
}

/// Walks a packet as a sequence of concatenated frames, advancing by
/// `HEADER_LEN + payload_len` after each. A frame whose declared
/// `payload_len` exceeds the remaining buffer is malformed: the iterator
/// logs and stops, dropping the rest of the packet but preserving whatever
/// frames were already yielded.
pub struct FrameIter<'a> {
    buf: &'a [u8],
    pos: usize,
    stopped: bool,
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stopped || self.pos >= self.buf.len() {
            return None;
        }
        let remaining = &self.buf[self.pos..];
        let Some(header) = FrameHeader::decode(remaining) else {
            warn!(
                remaining = remaining.len(),
                "truncated frame header, dropping rest of packet"
            );
            self.stopped = true;
            return None;
        };
        let payload_start = self.pos + HEADER_LEN;
        let payload_end = payload_start + header.payload_len as usize;
        if payload_end > self.buf.len() {
            warn!(
                declared = header.payload_len,
                available = self.buf.len() - payload_start,
                "frame payload_len exceeds remaining buffer, dropping rest of packet"
            );
            self.stopped = true;
            return None;
        }
        self.pos = payload_end;
        Some(Frame { header, payload: &self.buf[payload_start..payload_end] })
    }
}

pub fn iter_frames(buf: &[u8]) -> FrameIter<'_> {
    FrameIter { buf, pos: 0, stopped: false }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn header_round_trips() {
        let header = FrameHeader { node_id: 0xDEAD_BEEF, payload_len: 1234, name_len: 5 };
        assert_eq!(FrameHeader::decode(&header.encode()).unwrap(), header);
    }

    #[test]
    fn single_frame_decodes() {
        let packet = frame_bytes(7, "print", &[0x2a]);
        let frames: Vec<_> = iter_frames(&packet).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.name_len, 5);
        assert_eq!(&frames[0].payload[..5], b"print");
        assert_eq!(&frames[0].payload[5..], &[0x2a]);
    }

    #[test]
    fn packed_frames_decode_in_order() {
        let mut packet = frame_bytes(1, "print", &[1]);
        packet.extend(frame_bytes(1, "print", &[2]));
        let frames: Vec<_> = iter_frames(&packet).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0].payload[5..], &[1]);
        assert_eq!(&frames[1].payload[5..], &[2]);
    }

    #[test]
    fn truncated_trailing_frame_still_yields_preceding_frames() {
        let mut packet = frame_bytes(1, "print", &[1]);
        let mut second = frame_bytes(1, "print", &[2]);
        second.truncate(second.len() - 1);
        packet.extend(second);
        let frames: Vec<_> = iter_frames(&packet).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].payload[5..], &[1]);
    }

    #[test]
    fn callback_frame_has_zero_name_len() {
        let header = FrameHeader { node_id: 3, payload_len: 8 + 2, name_len: 0 };
        let mut buf = header.encode().to_vec();
        buf.extend_from_slice(&99u64.to_le_bytes());
        buf.extend_from_slice(&[0x01, 0x02]);
        let frames: Vec<_> = iter_frames(&buf).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.name_len, 0);
        let token = u64::from_le_bytes(frames[0].payload[..8].try_into().unwrap());
        assert_eq!(token, 99);
        assert_eq!(&frames[0].payload[8..], &[0x01, 0x02]);
    }
}
