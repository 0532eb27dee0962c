//! Resolving iCalendar date/time values onto the UTC timeline.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::parser::{Component, Property};
use icalendar::{CalendarDateTime, DatePerhapsTime};

/// A DTSTART-like value together with the zone it should be read in.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LocalTime {
    Date(NaiveDate),
    Utc(DateTime<Utc>),
    Zoned(NaiveDateTime, Tz),
}

impl LocalTime {
    /// Floating values and unknown TZIDs are pinned to `floating`.
    pub(crate) fn from_value(value: DatePerhapsTime, floating: Tz) -> Self {
        match value {
            DatePerhapsTime::Date(d) => LocalTime::Date(d),
            DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => LocalTime::Utc(dt),
            DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
                LocalTime::Zoned(naive, floating)
            }
            DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
                let tz = tzid.parse::<Tz>().unwrap_or(floating);
                LocalTime::Zoned(date_time, tz)
            }
        }
    }

    pub(crate) fn is_date(&self) -> bool {
        matches!(self, LocalTime::Date(_))
    }

    /// All-day values start at local midnight in `floating`.
    pub(crate) fn to_utc(&self, floating: Tz) -> Option<DateTime<Utc>> {
        match self {
            LocalTime::Utc(dt) => Some(*dt),
            LocalTime::Zoned(naive, tz) => local_to_utc(*naive, *tz),
            LocalTime::Date(d) => local_to_utc(d.and_hms_opt(0, 0, 0)?, floating),
        }
    }

    /// Form accepted by the rrule parser for DTSTART.
    pub(crate) fn to_dtstart_line(&self, floating: Tz) -> String {
        match self {
            LocalTime::Utc(dt) => format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ")),
            LocalTime::Zoned(naive, tz) => zoned_dtstart(*naive, *tz),
            LocalTime::Date(d) => zoned_dtstart(d.and_time(chrono::NaiveTime::MIN), floating),
        }
    }
}

fn zoned_dtstart(naive: NaiveDateTime, tz: Tz) -> String {
    if tz == Tz::UTC {
        format!("DTSTART:{}Z", naive.format("%Y%m%dT%H%M%S"))
    } else {
        format!("DTSTART;TZID={}:{}", tz.name(), naive.format("%Y%m%dT%H%M%S"))
    }
}

/// Ambiguous local times take the earlier instant; times inside a DST gap
/// are moved forward by an hour.
pub(crate) fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn find_time(component: &Component<'_>, name: &str, floating: Tz) -> Option<LocalTime> {
    let prop = component.find_prop(name)?;
    let value = DatePerhapsTime::try_from(prop).ok()?;
    Some(LocalTime::from_value(value, floating))
}

/// DURATION as a signed chrono duration (`-PT15M` is negative).
pub(crate) fn find_duration(component: &Component<'_>) -> Option<Duration> {
    let raw = component.find_prop("DURATION")?.val.as_ref().trim();
    let negative = raw.starts_with('-');
    let unsigned = raw.trim_start_matches(['-', '+']);

    let parsed = iso8601::duration(unsigned).ok()?;
    let std_duration: std::time::Duration = parsed.into();
    let duration = Duration::from_std(std_duration).ok()?;

    Some(if negative { -duration } else { duration })
}

/// Expand an EXDATE/RDATE property (possibly comma-separated) into instants.
pub(crate) fn parse_date_list(prop: &Property<'_>, floating: Tz) -> Vec<DateTime<Utc>> {
    let tz = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref())
        .and_then(|v| v.as_ref().parse::<Tz>().ok())
        .unwrap_or(floating);

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if is_date {
                NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .and_then(|d| local_to_utc(d.and_time(chrono::NaiveTime::MIN), floating))
            } else if let Some(utc) = s.strip_suffix('Z') {
                NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            } else {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .and_then(|dt| local_to_utc(dt, tz))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floating_time_uses_calendar_zone() {
        let naive = NaiveDate::from_ymd_opt(2011, 1, 1)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        let berlin: Tz = "Europe/Berlin".parse().unwrap();

        let local = LocalTime::Zoned(naive, berlin);
        let utc = local.to_utc(Tz::UTC).unwrap();

        assert_eq!(utc, Utc.with_ymd_and_hms(2011, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(
            local.to_dtstart_line(Tz::UTC),
            "DTSTART;TZID=Europe/Berlin:20110101T130000"
        );
    }

    #[test]
    fn test_dst_gap_moves_forward() {
        // 02:30 does not exist in Berlin on 2024-03-31
        let naive = NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let berlin: Tz = "Europe/Berlin".parse().unwrap();

        let utc = local_to_utc(naive, berlin).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 3, 31, 1, 30, 0).unwrap());
    }

    #[test]
    fn test_all_day_starts_at_local_midnight() {
        let date = LocalTime::Date(NaiveDate::from_ymd_opt(2011, 1, 1).unwrap());
        let new_york: Tz = "America/New_York".parse().unwrap();

        assert_eq!(
            date.to_utc(new_york).unwrap(),
            Utc.with_ymd_and_hms(2011, 1, 1, 5, 0, 0).unwrap()
        );
        assert_eq!(date.to_dtstart_line(Tz::UTC), "DTSTART:20110101T000000Z");
    }
}
