//! Date and time range types
//!
//! `DateRange` is the closed-closed storage view of an interval, while
//! `TimeRange` is what a query carries: the end is always inclusive and the
//! start is either inclusive or exclusive.

use crate::time::error::{RangeError, RangeResult};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed-closed range of millisecond timestamps: `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: i64,
    end: i64,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: i64,
    end: i64,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = RangeError;

    fn try_from(raw: RawDateRange) -> RangeResult<Self> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    /// Create a new date range
    ///
    /// Fails if `start` is negative or `end` comes before `start`.
    pub fn new(start: i64, end: i64) -> RangeResult<Self> {
        if start < 0 {
            return Err(RangeError::NegativeStart(start));
        }

        if end < start {
            return Err(RangeError::EndBeforeStart { start, end });
        }

        Ok(Self { start, end })
    }

    /// Zero-width range at the given instant
    pub fn at(now: i64) -> RangeResult<Self> {
        Self::new(now, now)
    }

    /// Zero-width range at the current wall-clock time
    pub fn now() -> Self {
        let now = Utc::now().timestamp_millis().max(0);
        Self { start: now, end: now }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// Width of the range in milliseconds
    pub fn diff(&self) -> i64 {
        self.end - self.start
    }

    /// Check if a timestamp falls within this range (both ends inclusive)
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Round both ends down to a multiple of `interval`
    ///
    /// Returns the same range if `interval <= 0`.
    pub fn rounded(&self, interval: i64) -> Self {
        if interval <= 0 {
            return *self;
        }

        Self {
            start: self.start - self.start % interval,
            end: self.end - self.end % interval,
        }
    }

    /// Translate both ends by `extent`, clamping each to zero
    pub fn shift(&self, extent: i64) -> Self {
        Self {
            start: self.start.saturating_add(extent).max(0),
            end: self.end.saturating_add(extent).max(0),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}-{{{}}}", format_millis(self.start), format_millis(self.end))
    }
}

fn format_millis(timestamp: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => timestamp.to_string(),
    }
}

/// Query time range with an inclusive end and an open or closed start
///
/// - open start: `(start, end]`
/// - closed start: `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
    pub open_start: bool,
}

impl TimeRange {
    fn new(start: i64, end: i64, open_start: bool) -> RangeResult<Self> {
        if start < 0 {
            return Err(RangeError::NegativeStart(start));
        }

        if end < start {
            return Err(RangeError::EndBeforeStart { start, end });
        }

        Ok(Self {
            start,
            end,
            open_start,
        })
    }

    /// Range `[start, end]`
    pub fn with_closed_start(start: i64, end: i64) -> RangeResult<Self> {
        Self::new(start, end, false)
    }

    /// Range `(start, end]`
    pub fn with_open_start(start: i64, end: i64) -> RangeResult<Self> {
        Self::new(start, end, true)
    }

    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        let after_start = if self.open_start {
            timestamp > self.start
        } else {
            timestamp >= self.start
        };

        after_start && timestamp <= self.end
    }

    /// Closed-start storage view of the same instants
    pub fn as_closed_start_date_range(&self) -> RangeResult<DateRange> {
        if self.open_start {
            DateRange::new(self.start + 1, self.end + 1)
        } else {
            DateRange::new(self.start, self.end)
        }
    }

    /// Open-start storage view of the same instants
    ///
    /// A closed range starting at zero has no open-start representation and
    /// yields `RangeError::NegativeStart`.
    pub fn as_open_start_date_range(&self) -> RangeResult<DateRange> {
        if self.open_start {
            DateRange::new(self.start, self.end)
        } else {
            DateRange::new(self.start - 1, self.end - 1)
        }
    }

    /// Split into contiguous pieces whose interior boundaries are multiples
    /// of `period_length`
    ///
    /// Every piece keeps this range's start flag. Only the final piece may be
    /// shorter than a period; a degenerate range yields itself.
    pub fn split_at_period_boundary(&self, period_length: i64) -> RangeResult<Vec<TimeRange>> {
        if period_length <= 0 {
            return Err(RangeError::InvalidPeriod(period_length));
        }

        let mut result = Vec::new();
        let mut start_at = self.start;
        let mut split_at = (self.start.div_euclid(period_length) + 1) * period_length;

        while split_at < self.end {
            result.push(TimeRange {
                start: start_at,
                end: split_at,
                open_start: self.open_start,
            });
            start_at = split_at;
            split_at += period_length;
        }

        result.push(TimeRange {
            start: start_at,
            end: self.end,
            open_start: self.open_start,
        });

        Ok(result)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.open_start { '(' } else { '[' };
        write!(f, "{}{}, {}]", open, self.start, self.end)
    }
}
