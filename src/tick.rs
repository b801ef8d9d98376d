//! 100-nanosecond ticks since `0001-01-01 00:00:00 UTC`, matching the
//! project's timestamp convention (the same epoch .NET's `DateTime` uses).

use std::time::Duration;

/// The smallest and largest tick values a `std::time::Duration`-based
/// representation can round-trip without overflow. We don't actually need
/// the full `0001-01-01`..`9999-12-31` range — only that out-of-range
/// values are rejected per `spec.md` §3 ("A frame with an unparseable or
/// unrecognized timestamp ... is dropped").
const MIN_TICK: i64 = 0;
const MAX_TICK: i64 = i64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(i64);

impl Tick {
    pub const TICKS_PER_SECOND: i64 = 10_000_000;

    /// Constructs a tick, rejecting values outside the representable range.
    pub fn new(ticks: i64) -> crate::error::Result<Tick> {
        if ticks < MIN_TICK || ticks > MAX_TICK {
            return Err(crate::error::Error::BadTimestamp(ticks));
        }
        Ok(Tick(ticks))
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// Saturating difference in seconds, used by the port-rollover gap test
    /// (`spec.md` §4.E: "the gap ... exceeds 20 seconds").
    pub fn gap_seconds(self, earlier: Tick) -> f64 {
        let delta = self.0.saturating_sub(earlier.0);
        delta as f64 / Self::TICKS_PER_SECOND as f64
    }

    pub fn duration_since(self, earlier: Tick) -> Option<Duration> {
        let delta = self.0.checked_sub(earlier.0)?;
        if delta < 0 {
            return None;
        }
        let secs = delta / Self::TICKS_PER_SECOND;
        let nanos = (delta % Self::TICKS_PER_SECOND) * 100;
        Some(Duration::new(secs as u64, nanos as u32))
    }
}
