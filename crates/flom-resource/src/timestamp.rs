//! Timestamp resource: hands out formatted timestamps, at most one per
//! interval of the format's finest specifier.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use tracing::trace;

use flom_core::error::{FlomError, FlomResult};
use flom_core::message::LockSpec;
use flom_core::timeout::{Deadline, Timeval, MICROS_PER_SEC};
use flom_core::traits::{Clock, ConnectionId};

use crate::reactivate::Resource;
use crate::record::{ConnectionLockRecord, LockInfo};

/// Longest fraction of second specifier; `#f` down to `#ffffff` print from
/// one to six decimal digits.
const FRACTION_SPECIFIER: &str = "#ffffff";

const PER_SECOND: &[&str] = &["%c", "%r", "%s", "%S", "%T", "%X"];
const PER_MINUTE: &[&str] = &["%M", "%R"];
const PER_HOUR: &[&str] = &["%H", "%I"];

/// Smallest time step the format can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Micros(i64),
    Seconds(i64),
}

impl Interval {
    /// Derives the interval from the finest specifier of `format`.
    ///
    /// # Errors
    ///
    /// Returns [`FlomError::InvalidTimestampFormat`] if nothing in the format
    /// changes at least once per hour.
    pub fn from_format(format: &str) -> FlomResult<Self> {
        let mut micros = 1;
        for digits in (1..=FRACTION_SPECIFIER.len() - 1).rev() {
            if format.contains(&FRACTION_SPECIFIER[..=digits]) {
                return Ok(Interval::Micros(micros));
            }
            micros *= 10;
        }

        let has_any = |specifiers: &[&str]| specifiers.iter().any(|s| format.contains(s));
        if has_any(PER_SECOND) {
            Ok(Interval::Seconds(1))
        } else if has_any(PER_MINUTE) {
            Ok(Interval::Seconds(60))
        } else if has_any(PER_HOUR) {
            Ok(Interval::Seconds(3600))
        } else {
            Err(FlomError::InvalidTimestampFormat(format!(
                "'{format}' has no specifier that changes at least once per hour"
            )))
        }
    }

    /// Is `now` in a later bucket than `last`?
    fn is_later_bucket(self, now: Timeval, last: Timeval) -> bool {
        match self {
            Interval::Micros(step) => {
                now.sec > last.sec || (now.sec == last.sec && now.usec / step > last.usec / step)
            }
            Interval::Seconds(step) => now.sec / step > last.sec / step,
        }
    }

    /// Start of the bucket that follows the one `last` falls in.
    fn next_bucket(self, last: Timeval) -> Deadline {
        match self {
            Interval::Micros(step) => Timeval::new(last.sec, (last.usec / step + 1) * step),
            Interval::Seconds(step) => Timeval::new((last.sec / step + 1) * step, 0),
        }
    }
}

/// Generator of unique timestamps.
///
/// Decisions taken while handling one event all use the same instant,
/// sampled from the clock (or given by the timer) when the event arrives.
pub struct TimestampResource {
    name: String,
    format: String,
    interval: Interval,
    total_quantity: u32,
    locked_quantity: u32,
    last_timestamp: Timeval,
    utc: bool,
    clock: Arc<dyn Clock>,
    now: Timeval,
    holders: Vec<ConnectionLockRecord>,
    waiters: VecDeque<ConnectionLockRecord>,
}

impl std::fmt::Debug for TimestampResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampResource")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("locked_quantity", &self.locked_quantity)
            .field("total_quantity", &self.total_quantity)
            .field("last_timestamp", &self.last_timestamp)
            .finish_non_exhaustive()
    }
}

impl TimestampResource {
    /// # Errors
    ///
    /// Returns [`FlomError::InvalidTimestampFormat`] if the format is not a
    /// valid strftime string or is coarser than one hour.
    pub fn new(
        name: impl Into<String>,
        format: impl Into<String>,
        total_quantity: u32,
        utc: bool,
        clock: Arc<dyn Clock>,
    ) -> FlomResult<Self> {
        let format = format.into();
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(FlomError::InvalidTimestampFormat(format!(
                "'{format}' contains an unknown specifier"
            )));
        }
        let interval = Interval::from_format(&format)?;
        let now = clock.now();
        Ok(Self {
            name: name.into(),
            format,
            interval,
            total_quantity,
            locked_quantity: 0,
            last_timestamp: Timeval::ZERO,
            utc,
            clock,
            now,
            holders: Vec::new(),
            waiters: VecDeque::new(),
        })
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn last_timestamp(&self) -> Timeval {
        self.last_timestamp
    }

    pub fn locked_quantity(&self) -> u32 {
        self.locked_quantity
    }

    /// Is a holder slot available for the next grant?
    pub fn has_free_slot(&self) -> bool {
        self.locked_quantity < self.total_quantity
    }

    /// When the next waiter could be served, given the last issued value.
    pub fn next_deadline(&self) -> Deadline {
        self.interval.next_bucket(self.last_timestamp)
    }

    /// Carries the last issued value over from a previous incarnation so a
    /// recreated resource never repeats a bucket.
    pub(crate) fn resume_after(&mut self, last: Timeval) {
        self.last_timestamp = self.last_timestamp.max(last);
    }

    /// Samples the clock for the event being handled.
    pub(crate) fn observe_clock(&mut self) {
        self.now = self.clock.now();
    }

    /// Uses `now` for the event being handled.
    pub(crate) fn observe(&mut self, now: Timeval) {
        self.now = now;
    }

    pub(crate) fn clear(&mut self) {
        self.holders.clear();
        self.waiters.clear();
        self.locked_quantity = 0;
    }

    /// Renders `tv` with the resource format.
    pub fn format_timestamp(&self, tv: Timeval) -> FlomResult<String> {
        let pattern = expand_fractions(&self.format, tv.usec);
        let utc = DateTime::<Utc>::from_timestamp(tv.sec, (tv.usec * 1_000) as u32).ok_or_else(
            || FlomError::Internal(format!("timestamp {tv} is out of range")),
        )?;

        let mut rendered = String::new();
        let written = if self.utc {
            write!(rendered, "{}", utc.format_with_items(StrftimeItems::new(&pattern)))
        } else {
            let local = utc.with_timezone(&Local);
            write!(rendered, "{}", local.format_with_items(StrftimeItems::new(&pattern)))
        };
        written.map_err(|_| {
            FlomError::InvalidTimestampFormat(format!("unable to render '{}'", self.format))
        })?;
        Ok(rendered)
    }
}

/// Replaces every `#f`..`#ffffff` with a dot followed by that many leading
/// digits of the microseconds, longest specifier first.
fn expand_fractions(format: &str, usec: i64) -> String {
    let micros = format!("{:06}", usec.clamp(0, MICROS_PER_SEC - 1));
    let mut expanded = format.to_string();
    for digits in (1..=FRACTION_SPECIFIER.len() - 1).rev() {
        let specifier = &FRACTION_SPECIFIER[..=digits];
        expanded = expanded.replace(specifier, &format!(".{}", &micros[..digits]));
    }
    expanded
}

impl Resource for TimestampResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn waiters(&self) -> &VecDeque<ConnectionLockRecord> {
        &self.waiters
    }

    fn waiters_mut(&mut self) -> &mut VecDeque<ConnectionLockRecord> {
        &mut self.waiters
    }

    fn new_record(
        &self,
        _spec: &LockSpec,
        connection: ConnectionId,
    ) -> FlomResult<ConnectionLockRecord> {
        Ok(ConnectionLockRecord::new(connection, LockInfo::Timestamp(None)))
    }

    fn can_lock(&self, _record: &ConnectionLockRecord) -> bool {
        if !self.has_free_slot() {
            trace!(resource = %self.name, "no free timestamp slot");
            return false;
        }
        let later = self.interval.is_later_bucket(self.now, self.last_timestamp);
        trace!(
            resource = %self.name,
            now = %self.now,
            last = %self.last_timestamp,
            later,
            "timestamp bucket check"
        );
        later
    }

    fn grant(&mut self, mut record: ConnectionLockRecord) -> FlomResult<Option<String>> {
        let now = self.now;
        let rendered = self.format_timestamp(now)?;
        self.last_timestamp = now;
        self.locked_quantity += 1;
        record.info = LockInfo::Timestamp(Some(now));
        self.holders.push(record);
        Ok(Some(rendered))
    }

    fn release(
        &mut self,
        connection: ConnectionId,
        _rollback: Option<bool>,
    ) -> Option<ConnectionLockRecord> {
        let position = self.holders.iter().position(|h| h.connection == connection)?;
        self.locked_quantity = self.locked_quantity.saturating_sub(1);
        Some(self.holders.remove(position))
    }

    fn holds(&self, connection: ConnectionId) -> bool {
        self.holders.iter().any(|h| h.connection == connection)
    }

    fn has_holders(&self) -> bool {
        !self.holders.is_empty()
    }
}
