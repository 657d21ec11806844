use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::Nanos;

/// A span of time in nanoseconds. Unlike the rdtscp-tick-based original this
/// backend stores plain nanoseconds, so unit conversions are exact
/// multiplication/division rather than a runtime-calibrated factor.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct Duration(pub u64);

impl Duration {
    pub const MAX: Self = Self(u64::MAX);
    pub const ZERO: Self = Self(0);
    pub const MIN: Self = Self(0);
    pub const MILLIS_10: Self = Self::from_millis_const(10);
    pub const MILLIS_5: Self = Self::from_millis_const(5);

    #[inline]
    pub const fn from_millis_const(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Duration) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    #[inline]
    pub fn saturating_add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub const fn from_secs(s: u64) -> Self {
        Self(s * 1_000_000_000)
    }

    #[inline]
    pub const fn from_mins(s: u64) -> Self {
        Self::from_secs(s * 60)
    }

    #[inline]
    pub fn from_secs_f64(s: f64) -> Self {
        Self::from_nanos((s * 1_000_000_000.0).round() as u64)
    }

    #[inline]
    pub const fn from_millis(s: u64) -> Self {
        Self(s * 1_000_000)
    }

    #[inline]
    pub const fn from_micros(s: u64) -> Self {
        Self(s * 1_000)
    }

    #[inline]
    pub const fn from_nanos(s: u64) -> Self {
        Self(s)
    }

    #[inline]
    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    #[inline]
    pub fn as_millis(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Rounded-up whole milliseconds, used by the timer coordinator so the
    /// reactor's millisecond-granularity wait never returns early.
    #[inline]
    pub fn as_millis_ceil(&self) -> u64 {
        self.0.div_ceil(1_000_000)
    }

    #[inline]
    pub fn as_micros(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    #[inline]
    pub fn as_micros_u128(&self) -> u128 {
        u128::from(self.0) / 1000
    }

    #[inline]
    pub fn as_nanos(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Nanos(self.0).fmt(f)
    }
}

impl From<u64> for Duration {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Duration> for u64 {
    fn from(value: Duration) -> Self {
        value.0
    }
}

impl Add for Duration {
    type Output = Duration;

    #[inline]
    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Duration {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub for Duration {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0.wrapping_sub(rhs.0))
    }
}

impl SubAssign for Duration {
    #[inline]
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Mul<u32> for Duration {
    type Output = Duration;

    #[inline]
    fn mul(self, rhs: u32) -> Duration {
        Duration(self.0 * u64::from(rhs))
    }
}

impl Mul<usize> for Duration {
    type Output = Duration;

    #[inline]
    fn mul(self, rhs: usize) -> Duration {
        Duration(self.0 * rhs as u64)
    }
}

impl Mul<Duration> for u32 {
    type Output = Duration;

    #[inline]
    fn mul(self, rhs: Duration) -> Duration {
        rhs * self
    }
}

impl MulAssign<u32> for Duration {
    #[inline]
    fn mul_assign(&mut self, rhs: u32) {
        *self = *self * rhs;
    }
}

impl Div<u32> for Duration {
    type Output = Duration;

    #[inline]
    fn div(self, rhs: u32) -> Duration {
        Duration(self.0 / u64::from(rhs))
    }
}

impl Div<usize> for Duration {
    type Output = Duration;

    #[inline]
    fn div(self, rhs: usize) -> Duration {
        Duration(self.0 / rhs as u64)
    }
}

impl Div<Duration> for Duration {
    type Output = u64;

    #[inline]
    fn div(self, rhs: Duration) -> u64 {
        self.0 / rhs.0
    }
}

impl DivAssign<u32> for Duration {
    #[inline]
    fn div_assign(&mut self, rhs: u32) {
        *self = *self / rhs;
    }
}

impl Mul<u64> for Duration {
    type Output = Duration;

    #[inline]
    fn mul(self, rhs: u64) -> Duration {
        Duration(self.0 * rhs)
    }
}

impl Mul<Duration> for u64 {
    type Output = Duration;

    #[inline]
    fn mul(self, rhs: Duration) -> Duration {
        rhs * self
    }
}

impl MulAssign<u64> for Duration {
    #[inline]
    fn mul_assign(&mut self, rhs: u64) {
        *self = *self * rhs;
    }
}

impl Div<u64> for Duration {
    type Output = Duration;

    #[inline]
    fn div(self, rhs: u64) -> Duration {
        Duration(self.0 / rhs)
    }
}

impl DivAssign<u64> for Duration {
    #[inline]
    fn div_assign(&mut self, rhs: u64) {
        *self = *self / rhs;
    }
}

impl PartialEq for Duration {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Duration {}

impl PartialOrd for Duration {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Duration {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl From<Duration> for f64 {
    #[inline]
    fn from(value: Duration) -> f64 {
        value.0 as f64
    }
}

impl std::iter::Sum for Duration {
    #[inline]
    fn sum<I>(iter: I) -> Self
    where
        I: Iterator<Item = Self>,
    {
        Duration(iter.map(|v| v.0).sum())
    }
}

impl From<u32> for Duration {
    #[inline]
    fn from(value: u32) -> Self {
        Duration(u64::from(value))
    }
}

impl From<Duration> for std::time::Duration {
    #[inline]
    fn from(value: Duration) -> Self {
        std::time::Duration::from_nanos(value.0)
    }
}

impl From<std::time::Duration> for Duration {
    #[inline]
    fn from(value: std::time::Duration) -> Self {
        Self(value.as_nanos() as u64)
    }
}

impl From<Nanos> for Duration {
    #[inline]
    fn from(value: Nanos) -> Self {
        Self(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_std_duration() {
        let d = Duration::from_millis(123);
        let std_d: std::time::Duration = d.into();
        assert_eq!(std_d.as_millis(), 123);
        assert_eq!(Duration::from(std_d).0, d.0);
    }

    #[test]
    fn as_millis_ceil_rounds_up() {
        assert_eq!(Duration::from_nanos(1).as_millis_ceil(), 1);
        assert_eq!(Duration::from_millis(5).as_millis_ceil(), 5);
        assert_eq!(Duration::ZERO.as_millis_ceil(), 0);
    }
}
