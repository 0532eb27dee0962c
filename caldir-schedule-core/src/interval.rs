//! Busy intervals and the set operations the calculator builds on.
//!
//! All helpers take and return ranges sorted by start, non-overlapping and
//! non-adjacent (the output of [`merge_ranges`]).

use chrono::{DateTime, Utc};

use crate::time_range::TimeRange;

/// FBTYPE of a free/busy period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BusyKind {
    Busy,
    BusyUnavailable,
    BusyTentative,
}

impl BusyKind {
    pub fn fbtype(&self) -> &'static str {
        match self {
            BusyKind::Busy => "BUSY",
            BusyKind::BusyUnavailable => "BUSY-UNAVAILABLE",
            BusyKind::BusyTentative => "BUSY-TENTATIVE",
        }
    }
}

/// Half-open `[start, end)` period on the UTC timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: BusyKind,
}

impl BusyInterval {
    pub fn new(range: TimeRange, kind: BusyKind) -> Self {
        BusyInterval {
            start: range.start,
            end: range.end,
            kind,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// Sort by start, then sweep: the next range folds into the current one
/// whenever it starts at or before the current end.
pub fn merge_ranges(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    ranges.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(current) if range.start <= current.end => {
                current.end = current.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Parts of `from` not covered by `remove`.
pub fn subtract_ranges(from: &[TimeRange], remove: &[TimeRange]) -> Vec<TimeRange> {
    let mut result = Vec::new();

    for range in from {
        let mut cursor = range.start;

        for hole in remove.iter().filter(|r| r.overlaps(range)) {
            if let Some(piece) = TimeRange::new(cursor, hole.start) {
                result.push(piece);
            }
            cursor = cursor.max(hole.end);
        }

        if let Some(piece) = TimeRange::new(cursor, range.end) {
            result.push(piece);
        }
    }

    result
}
