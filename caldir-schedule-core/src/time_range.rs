//! Half-open UTC time ranges.

use chrono::{DateTime, Utc};

/// `[start, end)` on the UTC timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Returns None unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(TimeRange { start, end })
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Intersection, or None when it would be empty.
    pub fn clip(&self, to: &TimeRange) -> Option<TimeRange> {
        TimeRange::new(self.start.max(to.start), self.end.min(to.end))
    }

    /// CalDAV/iCalendar UTC form: `YYYYMMDDTHHMMSSZ`
    pub fn format_utc(dt: &DateTime<Utc>) -> String {
        dt.format("%Y%m%dT%H%M%SZ").to_string()
    }
}
