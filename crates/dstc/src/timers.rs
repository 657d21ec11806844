//! Timer coordinator: nearest absolute deadline across the pub and sub
//! contexts, converted to a relative millisecond timeout for the reactor.

use dstc_timing::Instant;
use dstc_transport::{PubTransport, SubTransport};

/// Process-local monotonic microsecond timestamp. Comparable only within one
/// process (see `dstc_timing::Instant`'s own doc comment); this is not wall
/// clock time.
pub fn now_us() -> i64 {
    i64::try_from(Instant::now().as_delta_nanos().0 / 1_000).unwrap_or(i64::MAX)
}

/// `min(pub_next, sub_next)`, treating `None` as +infinity. `None` only when
/// both are `None`.
pub fn next_deadline_us<P: PubTransport, S: SubTransport>(pub_t: &P, sub_t: &S) -> Option<i64> {
    match (pub_t.next_deadline_us(), sub_t.next_deadline_us()) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (Some(a), Some(b)) => Some(a.min(b)),
    }
}

/// Converts an absolute microsecond `deadline` into a non-negative relative
/// millisecond timeout: `0` if already due, `None` for "wait indefinitely".
/// Rounds up so the reactor never returns early.
pub fn deadline_to_relative_ms(deadline_us: Option<i64>, now_us: i64) -> Option<u64> {
    let deadline_us = deadline_us?;
    let delta = deadline_us - now_us;
    if delta <= 0 {
        return Some(0);
    }
    Some((delta as u64).div_ceil(1_000))
}
