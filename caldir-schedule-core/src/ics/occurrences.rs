//! Occurrence expansion for stored calendar objects.
//!
//! Turns raw calendar-object text into the absolute time spans its components
//! occupy inside a window, expanding RRULE/RDATE/EXDATE with the rrule crate
//! and letting RECURRENCE-ID overrides replace the instance they override.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use icalendar::parser::{Component, read_calendar, unfold};
use rrule::RRuleSet;

use crate::error::{ScheduleError, ScheduleResult};
use crate::ics::time::{LocalTime, find_duration, find_time, parse_date_list};
use crate::time_range::TimeRange;

/// Upper bound on instances generated per recurring master.
const MAX_INSTANCES: u16 = 1000;

/// Spans during which the object's events make their owner busy.
///
/// Cancelled events and events marked `TRANSP:TRANSPARENT` are skipped.
/// Spans are clipped to `window`; zero-length ones are dropped.
pub fn busy_occurrences(raw: &str, window: &TimeRange, floating: Tz) -> ScheduleResult<Vec<TimeRange>> {
    let unfolded = unfold(raw);
    let calendar = read_calendar(&unfolded).map_err(|e| ScheduleError::IcsParse(e.to_string()))?;

    let events: Vec<&Component<'_>> = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .collect();

    Ok(expand_components(&events, window, floating, blocks_time))
}

/// Whether any event in the object, busy or not, touches `window`.
pub fn overlaps_window(raw: &str, window: &TimeRange, floating: Tz) -> ScheduleResult<bool> {
    let unfolded = unfold(raw);
    let calendar = read_calendar(&unfolded).map_err(|e| ScheduleError::IcsParse(e.to_string()))?;

    let events: Vec<&Component<'_>> = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .collect();

    Ok(!expand_components(&events, window, floating, |_| true).is_empty())
}

fn blocks_time(component: &Component<'_>) -> bool {
    let cancelled = component
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref().eq_ignore_ascii_case("CANCELLED"));
    let transparent = component
        .find_prop("TRANSP")
        .is_some_and(|p| p.val.as_ref().eq_ignore_ascii_case("TRANSPARENT"));

    !cancelled && !transparent
}

/// Expand a set of sibling components (VEVENTs of one object, AVAILABLEs of
/// one VAVAILABILITY) into clipped spans, ordered by start.
///
/// Components sharing a UID are treated as one series: the one without
/// RECURRENCE-ID is the master, the others override single instances.
/// `include` decides whether a component contributes; an excluded override
/// still suppresses the master instance it replaces.
pub(crate) fn expand_components(
    components: &[&Component<'_>],
    window: &TimeRange,
    floating: Tz,
    include: impl Fn(&Component<'_>) -> bool,
) -> Vec<TimeRange> {
    let mut overridden: HashMap<String, HashSet<DateTime<Utc>>> = HashMap::new();
    for component in components {
        let Some(uid) = component.find_prop("UID") else {
            continue;
        };
        if let Some(recurrence_id) = find_time(component, "RECURRENCE-ID", floating)
            .and_then(|t| t.to_utc(floating))
        {
            overridden
                .entry(uid.val.to_string())
                .or_default()
                .insert(recurrence_id);
        }
    }

    let no_overrides = HashSet::new();
    let mut spans = Vec::new();

    for component in components {
        if !include(component) {
            continue;
        }

        let is_override = component.find_prop("RECURRENCE-ID").is_some();
        let skip = component
            .find_prop("UID")
            .and_then(|uid| overridden.get(uid.val.as_ref()))
            .filter(|_| !is_override)
            .unwrap_or(&no_overrides);

        match component_spans(component, window, floating, skip) {
            Ok(found) => spans.extend(found),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping component that could not be expanded");
            }
        }
    }

    spans.sort_by_key(|span| (span.start, span.end));
    spans
}

/// Clipped spans of a single component; `skip` holds overridden instance starts.
fn component_spans(
    component: &Component<'_>,
    window: &TimeRange,
    floating: Tz,
    skip: &HashSet<DateTime<Utc>>,
) -> ScheduleResult<Vec<TimeRange>> {
    let Some(start) = find_time(component, "DTSTART", floating) else {
        return Ok(Vec::new());
    };
    let Some(start_utc) = start.to_utc(floating) else {
        return Ok(Vec::new());
    };

    let duration = component_duration(component, &start, start_utc, floating);
    if duration <= Duration::zero() {
        return Ok(Vec::new());
    }

    let is_override = component.find_prop("RECURRENCE-ID").is_some();
    let starts = match component.find_prop("RRULE") {
        Some(rrule) if !is_override => {
            expand_rrule(&start, rrule.val.as_ref(), window, duration, floating)?
        }
        _ => vec![start_utc],
    };

    let rdates = component
        .properties
        .iter()
        .filter(|p| p.name == "RDATE")
        .flat_map(|p| parse_date_list(p, floating));
    let exdates: HashSet<DateTime<Utc>> = component
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(|p| parse_date_list(p, floating))
        .collect();

    let mut all_starts: Vec<DateTime<Utc>> = starts.into_iter().chain(rdates).collect();
    all_starts.sort();
    all_starts.dedup();

    Ok(all_starts
        .into_iter()
        .filter(|s| !exdates.contains(s) && !skip.contains(s))
        .filter_map(|s| TimeRange::new(s, s + duration))
        .filter_map(|span| span.clip(window))
        .collect())
}

/// DTEND wins over DURATION; all-day components default to one day.
fn component_duration(
    component: &Component<'_>,
    start: &LocalTime,
    start_utc: DateTime<Utc>,
    floating: Tz,
) -> Duration {
    if let Some(end_utc) = find_time(component, "DTEND", floating).and_then(|t| t.to_utc(floating)) {
        return end_utc - start_utc;
    }

    if let Some(duration) = find_duration(component) {
        return duration;
    }

    if start.is_date() {
        Duration::days(1)
    } else {
        Duration::zero()
    }
}

/// Instance starts of a recurring component whose span can reach into `window`.
fn expand_rrule(
    start: &LocalTime,
    rule: &str,
    window: &TimeRange,
    duration: Duration,
    floating: Tz,
) -> ScheduleResult<Vec<DateTime<Utc>>> {
    let rrule_str = format!("{}\nRRULE:{}", start.to_dtstart_line(floating), rule);

    let rrule_set: RRuleSet = rrule_str
        .parse()
        .map_err(|e| ScheduleError::IcsParse(format!("Failed to parse RRULE '{rule}': {e}")))?;

    // after/before are exclusive; widen by a second and let clipping trim the rest
    let tz: rrule::Tz = Utc.into();
    let after = (window.start - duration - Duration::seconds(1)).with_timezone(&tz);
    let before = (window.end + Duration::seconds(1)).with_timezone(&tz);

    let result = rrule_set.after(after).before(before).all(MAX_INSTANCES);
    if result.limited {
        tracing::debug!(rule, "Recurrence expansion hit the instance limit");
    }

    Ok(result
        .dates
        .iter()
        .map(|dt| dt.with_timezone(&Utc))
        .collect())
}
