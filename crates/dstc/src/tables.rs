//! The three symbol tables: local functions by name, one-shot callbacks by
//! opaque token, and remote functions by name with an advertisement refcount.
//!
//! Fixed-capacity C arrays in the source; here growable storage with the
//! same capacity-checked, fatal-on-exceed discipline.

use dstc_utils::{ArrayStr, fatal};

/// Bound on a registered function or remote-function name: a bounded
/// string of at most 255 bytes.
pub const MAX_NAME_LEN: usize = 255;

pub type LocalHandler = Box<dyn Fn(u64, &[u8]) + Send + Sync>;
pub type CallbackHandler = Box<dyn FnOnce(u64, &[u8]) + Send>;

/// Local functions, newest registration wins on name collision. Stored as a
/// `Vec` rather than a map so that invariant ("duplicates are appended;
/// lookup returns the most recently registered") falls out of a reverse
/// linear scan instead of needing to be special-cased against map semantics.
pub struct LocalTable {
    capacity: usize,
    entries: Vec<(ArrayStr<MAX_NAME_LEN>, LocalHandler)>,
}

impl LocalTable {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Vec::new() }
    }

    /// Appends `(name, handler)`. Fatal if the table is already at capacity.
    pub fn register(&mut self, name: &str, handler: LocalHandler) {
        if self.entries.len() >= self.capacity {
            fatal!("local function table full (capacity {}), registering [{name}]", self.capacity);
        }
        let Ok(name) = ArrayStr::<MAX_NAME_LEN>::try_from(name) else {
            fatal!("local function name [{name}] exceeds {MAX_NAME_LEN} bytes");
        };
        self.entries.push((name, handler));
    }

    /// Newest-to-oldest scan; returns the first (most recent) match.
    pub fn find(&self, name: &[u8]) -> Option<&LocalHandler> {
        self.entries.iter().rev().find(|(n, _)| n.as_str().as_bytes() == name).map(|(_, h)| h)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArrayStr<MAX_NAME_LEN>> {
        self.entries.iter().map(|(n, _)| n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One-shot callbacks keyed by an opaque, monotonically increasing token:
/// Rust closures have no stable address to reuse as wire identity.
#[derive(Default)]
pub struct CallbackTable {
    capacity: usize,
    next_token: u64,
    entries: std::collections::HashMap<u64, CallbackHandler>,
}

impl CallbackTable {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, next_token: 1, entries: std::collections::HashMap::new() }
    }

    /// Registers `handler` under a fresh token. Fatal if the table is full.
    pub fn register(&mut self, handler: CallbackHandler) -> u64 {
        if self.entries.len() >= self.capacity {
            fatal!("callback table full (capacity {})", self.capacity);
        }
        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1).max(1);
        self.entries.insert(token, handler);
        token
    }

    /// Consumes and returns the handler registered under `token`, if any.
    /// A second call with the same token returns `None`: the slot is
    /// cleared on first lookup.
    pub fn find(&mut self, token: u64) -> Option<CallbackHandler> {
        self.entries.remove(&token)
    }

    /// Equivalent to `find` discarding the result: repeating this after the
    /// slot is already empty is a no-op.
    pub fn cancel(&mut self, token: u64) {
        self.entries.remove(&token);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Remote functions advertised by peers, with a refcount of distinct
/// advertising peers. Never decremented: `count` is a high-water mark, not a
/// live-peer count. See `count`'s doc comment below.
pub struct RemoteTable {
    capacity: usize,
    entries: Vec<(ArrayStr<MAX_NAME_LEN>, u32)>,
}

impl RemoteTable {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Vec::new() }
    }

    /// Increments the name's refcount if already present; otherwise appends
    /// with refcount 1. Fatal if the table would grow past capacity.
    pub fn register(&mut self, name: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n.as_str() == name) {
            entry.1 += 1;
            return;
        }
        if self.entries.len() >= self.capacity {
            fatal!("remote function table full (capacity {}), advertising [{name}]", self.capacity);
        }
        self.entries.push((ArrayStr::from_str_truncate(name), 1));
    }

    /// A high-water mark of distinct peers that have ever advertised `name`,
    /// not a live count: peer disconnects are never observed by the
    /// reference transport (connectionless UDP multicast) and so never
    /// decrement it. Monotonically non-decreasing over the process lifetime.
    pub fn count(&self, name: &str) -> u32 {
        self.entries.iter().find(|(n, _)| n.as_str() == name).map_or(0, |(_, c)| *c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_table_newest_wins() {
        let mut t = LocalTable::new(4);
        t.register("print", Box::new(|_, _| {}));
        t.register("print", Box::new(|_, args| assert_eq!(args, &[9])));
        let handler = t.find(b"print").expect("registered");
        handler(0, &[9]);
    }

    #[test]
    #[should_panic]
    fn local_table_capacity_exceeded_is_fatal() {
        let mut t = LocalTable::new(1);
        t.register("a", Box::new(|_, _| {}));
        t.register("b", Box::new(|_, _| {}));
    }

    #[test]
    fn callback_is_one_shot() {
        let mut t = CallbackTable::new(4);
        let token = t.register(Box::new(|_, _| {}));
        assert!(t.find(token).is_some());
        assert!(t.find(token).is_none());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut t = CallbackTable::new(4);
        let token = t.register(Box::new(|_, _| {}));
        t.cancel(token);
        t.cancel(token);
        assert!(t.find(token).is_none());
    }

    #[test]
    fn remote_count_accumulates_and_is_monotonic() {
        let mut t = RemoteTable::new(4);
        assert_eq!(t.count("print"), 0);
        t.register("print");
        assert_eq!(t.count("print"), 1);
        t.register("print");
        assert_eq!(t.count("print"), 2);
    }
}
