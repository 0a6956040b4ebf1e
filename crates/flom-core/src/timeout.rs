//! Wall-clock time values and deadlines.

use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Microseconds in one second.
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// A point in time as seconds and microseconds since the Unix epoch.
///
/// Invariant: `0 <= usec < 1_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Timeval {
    pub sec: i64,
    pub usec: i64,
}

/// Point in time at which the host must call back into a timestamp resource.
pub type Deadline = Timeval;

impl Timeval {
    /// The Unix epoch; also used as "no timestamp issued yet".
    pub const ZERO: Self = Self { sec: 0, usec: 0 };

    /// Builds a normalized value, carrying whole seconds out of `usec`.
    pub fn new(sec: i64, usec: i64) -> Self {
        Self {
            sec: sec + usec.div_euclid(MICROS_PER_SEC),
            usec: usec.rem_euclid(MICROS_PER_SEC),
        }
    }

    /// Total microseconds since the epoch.
    pub fn as_micros(&self) -> i64 {
        self.sec * MICROS_PER_SEC + self.usec
    }

    /// Duration from `self` until `later`, or zero if `later` is not later.
    pub fn until(&self, later: Timeval) -> Duration {
        let delta = later.as_micros() - self.as_micros();
        if delta <= 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(delta as u64)
        }
    }

    /// Returns `self + duration`.
    pub fn plus(&self, duration: Duration) -> Self {
        Self::new(self.sec, self.usec + duration.as_micros() as i64)
    }
}

impl Ord for Timeval {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.sec, self.usec).cmp(&(other.sec, other.usec))
    }
}

impl PartialOrd for Timeval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<SystemTime> for Timeval {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::new(d.as_secs() as i64, d.subsec_micros() as i64),
            Err(e) => {
                let d = e.duration();
                Self::new(-(d.as_secs() as i64), -(d.subsec_micros() as i64))
            }
        }
    }
}

impl fmt::Display for Timeval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.sec, self.usec)
    }
}
