//! Alert threshold - the maximum silence a task may have before it counts as stopped
//!
//! Stored as whole milliseconds. Anything that does not round down to at
//! least one millisecond is rejected at construction time.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, WatchdogError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct AlertThreshold {
    millis: u64,
}

impl AlertThreshold {
    pub fn from_millis(millis: u64) -> Result<Self> {
        if millis == 0 {
            return Err(WatchdogError::InvalidThreshold(Duration::from_millis(0)));
        }
        Ok(Self { millis })
    }

    pub fn from_duration(duration: Duration) -> Result<Self> {
        let millis = u64::try_from(duration.as_millis())
            .map_err(|_| WatchdogError::InvalidThreshold(duration))?;
        if millis == 0 {
            return Err(WatchdogError::InvalidThreshold(duration));
        }
        Ok(Self { millis })
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }

    /// Sleep between two ticks of the monitoring loop.
    ///
    /// Half the alert window, so a beat is always observed within one full
    /// threshold of the moment it was recorded. Never zero.
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis((self.millis / 2).max(1))
    }

    /// Strict comparison: silence equal to the threshold is still alive.
    pub fn is_exceeded_by(&self, elapsed_ms: i64) -> bool {
        // A u64 above i64::MAX can never be exceeded by an i64.
        match i64::try_from(self.millis) {
            Ok(limit) => elapsed_ms > limit,
            Err(_) => false,
        }
    }
}

impl TryFrom<Duration> for AlertThreshold {
    type Error = WatchdogError;

    fn try_from(value: Duration) -> Result<Self> {
        Self::from_duration(value)
    }
}

impl TryFrom<u64> for AlertThreshold {
    type Error = WatchdogError;

    fn try_from(value: u64) -> Result<Self> {
        Self::from_millis(value)
    }
}

impl TryFrom<u32> for AlertThreshold {
    type Error = WatchdogError;

    fn try_from(value: u32) -> Result<Self> {
        Self::from_millis(u64::from(value))
    }
}

impl TryFrom<i64> for AlertThreshold {
    type Error = WatchdogError;

    fn try_from(value: i64) -> Result<Self> {
        let millis = u64::try_from(value).map_err(|_| WatchdogError::NegativeThreshold(value))?;
        Self::from_millis(millis)
    }
}

impl TryFrom<i32> for AlertThreshold {
    type Error = WatchdogError;

    fn try_from(value: i32) -> Result<Self> {
        Self::try_from(i64::from(value))
    }
}

impl From<AlertThreshold> for u64 {
    fn from(value: AlertThreshold) -> Self {
        value.millis
    }
}

impl From<AlertThreshold> for Duration {
    fn from(value: AlertThreshold) -> Self {
        value.as_duration()
    }
}
