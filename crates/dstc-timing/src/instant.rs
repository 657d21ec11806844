use std::{
    ops::{Add, AddAssign, Sub, SubAssign},
    sync::OnceLock,
    time::Instant as StdInstant,
};

use serde::{Deserialize, Serialize};

use crate::{Duration, Nanos};

fn baseline() -> StdInstant {
    static BASELINE: OnceLock<StdInstant> = OnceLock::new();
    *BASELINE.get_or_init(StdInstant::now)
}

/// Nanoseconds elapsed since an arbitrary, process-local baseline fixed at
/// first use. Monotonic within one process; meaningless across processes or
/// after a restart.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub struct Instant(pub u64);

impl Instant {
    pub const MAX: Self = Self(u64::MAX);
    /// Sentinel earlier than any `Instant::now()`; used by [`crate::Repeater`]
    /// to force an initial fire.
    pub const ZERO: Self = Self(0);

    #[inline]
    pub fn now() -> Self {
        Instant(u64::try_from(baseline().elapsed().as_nanos()).unwrap_or(u64::MAX))
    }

    /// Kept for API parity with the rdtscp-socket-tagged original; this
    /// backend has no per-socket clock skew to detect, so two instants from
    /// the same process are always considered comparable.
    #[inline]
    pub fn same_socket(&self, _other: &Self) -> bool {
        true
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_sub(*self)
    }

    #[inline]
    pub fn elapsed_since(&self, since: Instant) -> Duration {
        self.saturating_sub(since)
    }

    #[inline]
    pub fn as_delta_nanos(&self) -> Nanos {
        Nanos(self.0)
    }

    #[inline]
    pub fn saturating_sub(&self, other: Instant) -> Duration {
        Duration(self.0.saturating_sub(other.0))
    }
}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sub for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration(self.0.saturating_sub(rhs.0))
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant(self.0.saturating_sub(rhs.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Self::Output {
        Instant(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl SubAssign<Duration> for Instant {
    fn sub_assign(&mut self, rhs: Duration) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}
