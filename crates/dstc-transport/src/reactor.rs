use std::time::Duration as StdDuration;

use dstc_utils::fatal;
use mio::{Events, Interest, Poll, Token, event::Source};
use tracing::warn;

/// Bit 16 distinguishes pub (1) from sub (0); the low 16 bits are the
/// connection index. No other bits are used. Packed this way because
/// `mio::Token` carries a single `usize` user word, same constraint the
/// readiness facility this was ported from (`epoll`) has.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventTag(u32);

const PUB_FLAG: u32 = 1 << 16;
const INDEX_MASK: u32 = 0xFFFF;

impl EventTag {
    #[inline]
    pub fn new(is_pub: bool, index: u16) -> Self {
        EventTag(if is_pub { PUB_FLAG } else { 0 } | u32::from(index))
    }

    #[inline]
    pub fn is_pub(self) -> bool {
        self.0 & PUB_FLAG != 0
    }

    #[inline]
    pub fn index(self) -> u16 {
        (self.0 & INDEX_MASK) as u16
    }

    #[inline]
    pub fn token(self) -> Token {
        Token(self.0 as usize)
    }
}

impl From<Token> for EventTag {
    fn from(t: Token) -> Self {
        EventTag(t.0 as u32)
    }
}

/// Thin adapter over a single readiness-notification facility (`mio::Poll`).
/// Owned by the core runtime; transports are handed a `&mut Reactor` to
/// register/unregister their sockets against.
pub struct Reactor {
    poll: Poll,
}

impl Reactor {
    pub fn new() -> Self {
        let poll = Poll::new().unwrap_or_else(|e| fatal!("failed to create reactor: {e}"));
        Self { poll }
    }

    /// Registers `source` under `tag` with `interest`. Failure is fatal:
    /// reactor add/modify failure means the process aborts.
    pub fn add(&mut self, tag: EventTag, source: &mut impl Source, interest: Interest) {
        if let Err(e) = self.poll.registry().register(source, tag.token(), interest) {
            fatal!("reactor add failed for tag {tag:?}: {e}");
        }
    }

    /// No-op when `old` and `new` are equal. Failure is fatal.
    pub fn modify(
        &mut self,
        tag: EventTag,
        source: &mut impl Source,
        old: Interest,
        new: Interest,
    ) {
        if old == new {
            return;
        }
        if let Err(e) = self.poll.registry().reregister(source, tag.token(), new) {
            fatal!("reactor modify failed for tag {tag:?}: {e}");
        }
    }

    /// Failure is logged and ignored: the descriptor is presumed already
    /// closed.
    pub fn remove(&mut self, source: &mut impl Source) {
        if let Err(e) = self.poll.registry().deregister(source) {
            warn!("reactor remove failed (descriptor presumed already closed): {e}");
        }
    }

    /// Blocks for at most `timeout`. `None` waits indefinitely. Failure is
    /// fatal.
    pub fn wait(&mut self, events: &mut Events, timeout: Option<StdDuration>) {
        if let Err(e) = self.poll.poll(events, timeout) {
            if e.kind() == std::io::ErrorKind::Interrupted {
                return;
            }
            fatal!("reactor wait failed: {e}");
        }
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}
