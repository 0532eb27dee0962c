//! Free/busy computation for one calendar home.
//!
//! Busy time comes from every opaque calendar under the home; declared
//! availability adds BUSY-UNAVAILABLE time wherever a window is in force but
//! no AVAILABLE slot covers it. Where both apply, BUSY wins.

use std::sync::Arc;

use chrono_tz::Tz;

use crate::availability::AvailabilityWindow;
use crate::backend::{CalendarStore, CalendarTransparency};
use crate::error::ScheduleResult;
use crate::ics::busy_occurrences;
use crate::interval::{BusyInterval, BusyKind, merge_ranges, subtract_ranges};
use crate::time_range::TimeRange;

#[derive(Clone)]
pub struct FreeBusyCalculator {
    store: Arc<dyn CalendarStore>,
}

impl FreeBusyCalculator {
    pub fn new(store: Arc<dyn CalendarStore>) -> Self {
        FreeBusyCalculator { store }
    }

    /// Intervals for `calendar_home` within `range`, sorted by start.
    pub async fn compute(
        &self,
        calendar_home: &str,
        range: &TimeRange,
        availability: &[AvailabilityWindow],
    ) -> ScheduleResult<Vec<BusyInterval>> {
        let mut busy = Vec::new();

        for calendar in self.store.list_calendars(calendar_home).await? {
            if self.store.calendar_transparency(&calendar).await? == CalendarTransparency::Transparent {
                tracing::trace!(calendar = %calendar.href, "Skipping transparent calendar");
                continue;
            }

            let floating = self
                .store
                .calendar_timezone(&calendar)
                .await?
                .unwrap_or(Tz::UTC);

            for object in self.store.objects_in_range(&calendar, range).await? {
                match busy_occurrences(&object, range, floating) {
                    Ok(spans) => busy.extend(spans),
                    Err(e) => {
                        tracing::debug!(calendar = %calendar.href, error = %e, "Dropping unreadable calendar object");
                    }
                }
            }
        }

        Ok(reconcile(busy, availability, range))
    }
}

/// Merge busy spans and overlay availability.
///
/// Unavailable time is the union of the window spans (clipped to `range`)
/// minus every AVAILABLE slot, minus busy time.
pub fn reconcile(
    busy: Vec<TimeRange>,
    availability: &[AvailabilityWindow],
    range: &TimeRange,
) -> Vec<BusyInterval> {
    let busy = merge_ranges(busy.iter().filter_map(|r| r.clip(range)).collect());

    let spans = merge_ranges(availability.iter().filter_map(|w| w.span_within(range)).collect());
    let available = merge_ranges(
        availability
            .iter()
            .flat_map(|w| w.available.iter().filter_map(|r| r.clip(range)))
            .collect(),
    );
    let unavailable = subtract_ranges(&subtract_ranges(&spans, &available), &busy);

    let mut intervals: Vec<BusyInterval> = busy
        .into_iter()
        .map(|r| BusyInterval::new(r, BusyKind::Busy))
        .chain(
            unavailable
                .into_iter()
                .map(|r| BusyInterval::new(r, BusyKind::BusyUnavailable)),
        )
        .collect();

    intervals.sort_by_key(|i| (i.start, i.end, i.kind));
    intervals
}
