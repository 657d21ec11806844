use std::{
    ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign},
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserializer, Serialize};

use crate::Duration;

/// Nanos since unix epoch, good till 2554 or so.
#[derive(Copy, Clone, Debug, Default, Serialize, Hash, PartialEq)]
#[repr(C)]
pub struct Nanos(pub u64);

/// Parse error for [`Nanos::from_str`]: anything not of the form `<number>`
/// or `<number><unit>` with unit one of `ns`, `us`, `ms`, `s`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid duration string {0:?}")]
pub struct ParseNanosError(String);

impl Nanos {
    pub const MAX: Nanos = Nanos(u64::MAX);
    pub const ZERO: Nanos = Nanos(0);

    #[inline]
    pub const fn from_secs(s: u64) -> Self {
        Nanos(s * 1_000_000_000)
    }

    #[inline]
    pub const fn from_months(s: u64) -> Self {
        Self::from_secs(s * 2_629_800)
    }

    #[inline]
    pub fn from_secs_f64(s: f64) -> Self {
        Nanos((s * 1_000_000_000.0).round() as u64)
    }

    #[inline]
    pub fn from_millis_f64(s: f64) -> Self {
        Nanos((s * 1_000_000.0).round() as u64)
    }

    #[inline]
    pub const fn from_millis(s: u64) -> Self {
        Nanos(s * 1_000_000)
    }

    #[inline]
    pub const fn from_micros(s: u64) -> Self {
        Nanos(s * 1_000)
    }

    #[inline]
    pub fn from_micros_f64(s: f64) -> Self {
        Nanos((s * 1_000.0).round() as u64)
    }

    #[inline]
    pub const fn from_mins(s: u64) -> Self {
        Nanos(s * 60 * 1_000_000_000)
    }

    #[inline]
    pub const fn from_hours(s: u64) -> Self {
        Nanos::from_mins(s * 60)
    }

    #[inline]
    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    #[inline]
    pub fn as_millis(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    #[inline]
    pub fn as_millis_u64(&self) -> u64 {
        self.0 / 1_000_000
    }

    #[inline]
    pub fn as_micros(&self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    #[inline]
    pub fn now() -> Self {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Nanos(u64::try_from(since_epoch.as_nanos()).unwrap_or(u64::MAX))
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Nanos) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    #[inline]
    pub fn elapsed(&self) -> Self {
        Nanos(Self::now().0 - self.0)
    }

    #[inline]
    pub fn elapsed_saturating(&self) -> Self {
        Self::now().saturating_sub(*self)
    }

    #[inline]
    pub fn elapsed_since(&self, since: Self) -> Self {
        Nanos(self.0.saturating_sub(since.0))
    }

    #[inline]
    pub fn round_to_secs(mut self) -> Nanos {
        self.0 /= 1_000_000_000;
        self.0 *= 1_000_000_000;
        self
    }

    #[inline]
    pub fn round_to_interval(mut self, interval: Nanos) -> Nanos {
        self.0 /= interval.0;
        self.0 *= interval.0;
        self
    }
}

impl std::fmt::Display for Nanos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
            write!(f, "")
        } else if *self < Nanos::from_micros(1) {
            write!(f, "{}ns", self.0)
        } else if *self < Nanos::from_millis(1) {
            write!(f, "{}μs", self.0 as f64 / 1000.0)
        } else if *self < Nanos::from_secs(1) {
            write!(f, "{}ms", (self.0 / 1000) as f64 / 1000.0)
        } else if *self < Nanos::from_mins(1) {
            write!(f, "{:0>2}s", (self.0 / 1_000_000) as f64 / 1000.0)
        } else if *self < Nanos::from_hours(1) {
            let min = self.0 / Nanos::from_mins(1).0;
            let s = *self - Nanos::from_mins(min);
            write!(f, "{min:0>2}m:{s:0>2}")
        } else {
            let hours = self.0 / Nanos::from_hours(1).0;
            let min = *self - Nanos::from_hours(hours);
            write!(f, "{hours:0>2}h:{min:0>2}")
        }
    }
}

impl From<Nanos> for u64 {
    #[inline]
    fn from(value: Nanos) -> Self {
        value.0
    }
}

impl Add for Nanos {
    type Output = Nanos;

    #[inline]
    fn add(self, rhs: Nanos) -> Nanos {
        Nanos(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Nanos {
    #[inline]
    fn add_assign(&mut self, rhs: Nanos) {
        *self = *self + rhs;
    }
}

impl Sub for Nanos {
    type Output = Nanos;

    #[inline]
    fn sub(self, rhs: Nanos) -> Nanos {
        Nanos(self.0 - rhs.0)
    }
}

impl SubAssign for Nanos {
    #[inline]
    fn sub_assign(&mut self, rhs: Nanos) {
        *self = *self - rhs;
    }
}

impl Mul<u64> for Nanos {
    type Output = Nanos;

    #[inline]
    fn mul(self, rhs: u64) -> Nanos {
        Nanos(self.0 * rhs)
    }
}

impl MulAssign<u64> for Nanos {
    #[inline]
    fn mul_assign(&mut self, rhs: u64) {
        *self = *self * rhs;
    }
}

impl Div<u64> for Nanos {
    type Output = Nanos;

    #[inline]
    fn div(self, rhs: u64) -> Nanos {
        Nanos(self.0 / rhs)
    }
}

impl DivAssign<u64> for Nanos {
    #[inline]
    fn div_assign(&mut self, rhs: u64) {
        *self = *self / rhs;
    }
}

impl Div<Nanos> for Nanos {
    type Output = u64;

    #[inline]
    fn div(self, rhs: Nanos) -> u64 {
        self.0 / rhs.0
    }
}

impl Eq for Nanos {}

impl PartialOrd for Nanos {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Nanos {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl std::iter::Sum for Nanos {
    #[inline]
    fn sum<I>(iter: I) -> Self
    where
        I: Iterator<Item = Self>,
    {
        Nanos(iter.map(|v| v.0).sum())
    }
}

impl From<u64> for Nanos {
    #[inline]
    fn from(value: u64) -> Self {
        Nanos(value)
    }
}

impl From<Duration> for Nanos {
    #[inline]
    fn from(value: Duration) -> Self {
        Nanos(value.0)
    }
}

impl From<Nanos> for std::time::Duration {
    #[inline]
    fn from(value: Nanos) -> Self {
        std::time::Duration::from_nanos(value.0)
    }
}

/// Parses `"500"` (nanoseconds) or `"<number><unit>"` with unit one of
/// `ns`, `us`, `ms`, `s`, fractional values allowed (`"10.12s"`).
impl FromStr for Nanos {
    type Err = ParseNanosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (number, unit) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
            Some(idx) => s.split_at(idx),
            None => (s, "ns"),
        };
        let value: f64 = number.parse().map_err(|_| ParseNanosError(s.to_owned()))?;
        let nanos_per_unit = match unit {
            "ns" | "" => 1.0,
            "us" | "µs" | "μs" => 1_000.0,
            "ms" => 1_000_000.0,
            "s" => 1_000_000_000.0,
            _ => return Err(ParseNanosError(s.to_owned())),
        };
        Ok(Nanos((value * nanos_per_unit).round() as u64))
    }
}

impl<'de> serde::Deserialize<'de> for Nanos {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use std::fmt;

        use serde::de::{self, Visitor};

        struct NanosVisitor;

        impl<'de> Visitor<'de> for NanosVisitor {
            type Value = Nanos;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an integer or a string with optional suffix (s, ms, us, ns)")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(Nanos(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                if value < 0 {
                    return Err(E::custom(format!("Nanos cannot be negative, got {value}")));
                }
                Ok(Nanos(value as u64))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Nanos::from_str(value).map_err(|e| {
                    E::custom(format!("failed to parse time value '{value}' as duration: {e}"))
                })
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_any(NanosVisitor)
        } else {
            u64::deserialize(deserializer).map(Nanos)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_from_string_seconds() {
        let result: Nanos = serde_json::from_str(r#""10s""#).unwrap();
        assert_eq!(result, Nanos::from_secs(10));
    }

    #[test]
    fn test_nanos_from_string_float_seconds() {
        let result: Nanos = serde_json::from_str(r#""10.12s""#).unwrap();
        assert_eq!(result, Nanos::from_millis(10_120));
    }

    #[test]
    fn test_nanos_from_string_milliseconds() {
        let result: Nanos = serde_json::from_str(r#""11ms""#).unwrap();
        assert_eq!(result, Nanos::from_millis(11));
    }

    #[test]
    fn test_nanos_from_string_microseconds() {
        let result: Nanos = serde_json::from_str(r#""12us""#).unwrap();
        assert_eq!(result, Nanos::from_micros(12));
    }

    #[test]
    fn test_nanos_from_number() {
        let result: Nanos = serde_json::from_str(r#"1"#).unwrap();
        assert_eq!(result, Nanos(1));
    }

    #[test]
    fn test_nanos_display_rounds_to_unit() {
        assert_eq!(Nanos::from_millis(250).to_string(), "250ms");
        assert_eq!(Nanos::from_micros(5).to_string(), "5μs");
    }
}
