//! Time source for beats and the monitoring loop
//!
//! Timestamps are wall-clock `DateTime<Utc>` at the API and epoch
//! milliseconds internally, so a single `AtomicI64` can hold the last beat.

use chrono::{DateTime, TimeZone, Utc};

/// Something that can tell the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Default clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Converts an epoch-millisecond value back into a timestamp.
///
/// Out-of-range values clamp to the chrono limits.
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(ts) => ts,
        None if millis < 0 => DateTime::<Utc>::MIN_UTC,
        None => DateTime::<Utc>::MAX_UTC,
    }
}
