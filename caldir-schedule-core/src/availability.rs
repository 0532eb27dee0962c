//! Declared availability (VAVAILABILITY, RFC 7953).

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use icalendar::parser::{Component, read_calendar, unfold};

use crate::error::{ScheduleError, ScheduleResult};
use crate::ics::expand_components;
use crate::ics::time::{find_duration, find_time};
use crate::time_range::TimeRange;

/// The raw `calendar-availability` property of a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityDocument(String);

/// One VAVAILABILITY: the span it governs and the AVAILABLE slots inside it.
///
/// A missing bound means the window is open on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub span_start: Option<DateTime<Utc>>,
    pub span_end: Option<DateTime<Utc>>,
    pub available: Vec<TimeRange>,
}

impl AvailabilityWindow {
    /// The governed span intersected with `range`.
    pub fn span_within(&self, range: &TimeRange) -> Option<TimeRange> {
        let start = self.span_start.map_or(range.start, |s| s.max(range.start));
        let end = self.span_end.map_or(range.end, |e| e.min(range.end));
        TimeRange::new(start, end)
    }
}

impl AvailabilityDocument {
    pub fn new(raw: impl Into<String>) -> Self {
        AvailabilityDocument(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Windows whose span touches `range`, with AVAILABLE slots expanded and
    /// clipped to `range`.
    ///
    /// Floating times are read as UTC.
    pub fn windows(&self, range: &TimeRange) -> ScheduleResult<Vec<AvailabilityWindow>> {
        let unfolded = unfold(&self.0);
        let calendar =
            read_calendar(&unfolded).map_err(|e| ScheduleError::IcsParse(e.to_string()))?;

        let mut windows = Vec::new();
        for component in calendar.components.iter().filter(|c| c.name == "VAVAILABILITY") {
            let window = parse_window(component, range);
            if window.span_within(range).is_some() {
                windows.push(window);
            }
        }

        if windows.is_empty() && !calendar.components.iter().any(|c| c.name == "VAVAILABILITY") {
            return Err(ScheduleError::IcsParse(
                "No VAVAILABILITY component in availability document".to_string(),
            ));
        }

        Ok(windows)
    }
}

fn parse_window(component: &Component<'_>, range: &TimeRange) -> AvailabilityWindow {
    let span_start = find_time(component, "DTSTART", Tz::UTC).and_then(|t| t.to_utc(Tz::UTC));
    let span_end = find_time(component, "DTEND", Tz::UTC)
        .and_then(|t| t.to_utc(Tz::UTC))
        .or_else(|| Some(span_start? + find_duration(component)?));

    let slots: Vec<&Component<'_>> = component
        .components
        .iter()
        .filter(|c| c.name == "AVAILABLE")
        .collect();

    AvailabilityWindow {
        span_start,
        span_end,
        available: expand_components(&slots, range, Tz::UTC, |_| true),
    }
}
