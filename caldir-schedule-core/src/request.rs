//! Parsing and validation of posted free/busy requests.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use icalendar::parser::{read_calendar, unfold};

use crate::address::CalendarAddress;
use crate::error::RequestError;
use crate::ics::time::find_time;
use crate::time_range::TimeRange;

/// Whether a Content-Type header names iCalendar data (`text/calendar`,
/// parameters ignored).
pub fn is_calendar_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("text/calendar"))
}

/// A validated free/busy query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingRequest {
    pub uid: Option<String>,
    pub organizer: CalendarAddress,
    /// In request order, duplicates kept.
    pub attendees: Vec<CalendarAddress>,
    pub range: TimeRange,
}

/// A METHOD:REQUEST VFREEBUSY whose fields have not been checked yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    uid: Option<String>,
    organizer: Option<CalendarAddress>,
    attendees: Vec<CalendarAddress>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

/// Check the document shape: a METHOD, and that it is REQUEST, and a VFREEBUSY.
pub fn parse_request(body: &str) -> Result<ParsedRequest, RequestError> {
    let unfolded = unfold(body);
    let calendar = read_calendar(&unfolded)
        .map_err(|e| RequestError::MalformedRequest(format!("Invalid iCalendar body: {e}")))?;

    let method = calendar
        .properties
        .iter()
        .find(|p| p.name == "METHOD")
        .map(|p| p.val.as_ref().trim().to_string())
        .ok_or_else(|| {
            RequestError::MalformedRequest(
                "A METHOD property must be specified in iTIP messages".to_string(),
            )
        })?;

    if !method.eq_ignore_ascii_case("REQUEST") {
        return Err(RequestError::UnsupportedMethod(method));
    }

    let vfreebusy = calendar
        .components
        .iter()
        .find(|c| c.name == "VFREEBUSY")
        .ok_or(RequestError::UnsupportedComponent)?;

    let attendees = vfreebusy
        .properties
        .iter()
        .filter(|p| p.name == "ATTENDEE")
        .map(|p| CalendarAddress::new(p.val.as_ref().trim()))
        .collect();

    Ok(ParsedRequest {
        uid: vfreebusy.find_prop("UID").map(|p| p.val.to_string()),
        organizer: vfreebusy
            .find_prop("ORGANIZER")
            .map(|p| CalendarAddress::new(p.val.as_ref().trim())),
        attendees,
        start: find_time(vfreebusy, "DTSTART", Tz::UTC).and_then(|t| t.to_utc(Tz::UTC)),
        end: find_time(vfreebusy, "DTEND", Tz::UTC).and_then(|t| t.to_utc(Tz::UTC)),
    })
}

impl ParsedRequest {
    /// Field checks, against the addresses the requesting principal owns.
    ///
    /// The organizer check runs before the attendee and range checks.
    pub fn validate(self, requester_addresses: &[String]) -> Result<SchedulingRequest, RequestError> {
        let organizer = self.organizer.ok_or_else(|| {
            RequestError::MalformedRequest("The VFREEBUSY component must have an ORGANIZER".to_string())
        })?;

        if !requester_addresses.iter().any(|a| organizer.matches(a)) {
            return Err(RequestError::OrganizerMismatch);
        }

        if self.attendees.is_empty() {
            return Err(RequestError::MalformedRequest(
                "At least one ATTENDEE property must be set on the VFREEBUSY component".to_string(),
            ));
        }

        let (Some(start), Some(end)) = (self.start, self.end) else {
            return Err(RequestError::MalformedRequest(
                "The VFREEBUSY component must have both DTSTART and DTEND".to_string(),
            ));
        };

        let range = TimeRange::new(start, end).ok_or_else(|| {
            RequestError::MalformedRequest("DTEND must be later than DTSTART".to_string())
        })?;

        Ok(SchedulingRequest {
            uid: self.uid,
            organizer,
            attendees: self.attendees,
            range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ORGANIZER: &str = "mailto:user1@example.org";

    fn body(method: Option<&str>, component: &str) -> String {
        let method_line = method.map(|m| format!("METHOD:{m}\r\n")).unwrap_or_default();
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{method_line}BEGIN:{component}\r\nUID:fb-1\r\n\
ORGANIZER:{ORGANIZER}\r\nATTENDEE:mailto:user2@example.org\r\n\
ATTENDEE:mailto:user3@example.org\r\nATTENDEE:mailto:user2@example.org\r\n\
DTSTART:20110101T080000Z\r\nDTEND:20110101T180000Z\r\nEND:{component}\r\nEND:VCALENDAR\r\n"
        )
    }

    #[test]
    fn test_media_type() {
        assert!(is_calendar_media_type("text/calendar"));
        assert!(is_calendar_media_type("Text/Calendar; charset=utf-8"));
        assert!(!is_calendar_media_type("application/xml"));
        assert!(!is_calendar_media_type(""));
    }

    #[test]
    fn test_missing_method_is_malformed() {
        let err = parse_request(&body(None, "VFREEBUSY")).unwrap_err();
        assert!(matches!(err, RequestError::MalformedRequest(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_other_method_is_unsupported() {
        let err = parse_request(&body(Some("PUBLISH"), "VFREEBUSY")).unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedMethod(ref m) if m == "PUBLISH"));
        assert_eq!(err.status_code(), 501);
    }

    #[test]
    fn test_missing_vfreebusy_is_unsupported_component() {
        let err = parse_request(&body(Some("REQUEST"), "VEVENT")).unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedComponent));
        assert_eq!(err.status_code(), 501);
    }

    #[test]
    fn test_valid_request_keeps_attendee_order_and_duplicates() {
        let request = parse_request(&body(Some("REQUEST"), "VFREEBUSY"))
            .unwrap()
            .validate(&["mailto:User1@Example.org".to_string()])
            .unwrap();

        assert_eq!(request.uid.as_deref(), Some("fb-1"));
        assert_eq!(request.organizer.as_str(), ORGANIZER);
        let attendees: Vec<&str> = request.attendees.iter().map(|a| a.as_str()).collect();
        assert_eq!(
            attendees,
            vec![
                "mailto:user2@example.org",
                "mailto:user3@example.org",
                "mailto:user2@example.org",
            ]
        );
        assert_eq!(
            request.range,
            TimeRange::new(
                Utc.with_ymd_and_hms(2011, 1, 1, 8, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2011, 1, 1, 18, 0, 0).unwrap(),
            )
            .unwrap()
        );
    }

    #[test]
    fn test_organizer_mismatch_is_forbidden() {
        let err = parse_request(&body(Some("REQUEST"), "VFREEBUSY"))
            .unwrap()
            .validate(&["mailto:user2@example.org".to_string()])
            .unwrap_err();

        assert!(matches!(err, RequestError::OrganizerMismatch));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_organizer_mismatch_wins_over_missing_fields() {
        let body = format!(
            "BEGIN:VCALENDAR\r\nMETHOD:REQUEST\r\nBEGIN:VFREEBUSY\r\nORGANIZER:{ORGANIZER}\r\nEND:VFREEBUSY\r\nEND:VCALENDAR\r\n"
        );

        let err = parse_request(&body).unwrap().validate(&[]).unwrap_err();
        assert!(matches!(err, RequestError::OrganizerMismatch));
    }

    #[test]
    fn test_missing_attendees_then_missing_range() {
        let requester = [ORGANIZER.to_string()];

        let no_attendees = format!(
            "BEGIN:VCALENDAR\r\nMETHOD:REQUEST\r\nBEGIN:VFREEBUSY\r\nORGANIZER:{ORGANIZER}\r\nEND:VFREEBUSY\r\nEND:VCALENDAR\r\n"
        );
        let err = parse_request(&no_attendees).unwrap().validate(&requester).unwrap_err();
        assert!(matches!(err, RequestError::MalformedRequest(ref m) if m.contains("ATTENDEE")));

        let no_range = format!(
            "BEGIN:VCALENDAR\r\nMETHOD:REQUEST\r\nBEGIN:VFREEBUSY\r\nORGANIZER:{ORGANIZER}\r\nATTENDEE:mailto:a@example.org\r\nEND:VFREEBUSY\r\nEND:VCALENDAR\r\n"
        );
        let err = parse_request(&no_range).unwrap().validate(&requester).unwrap_err();
        assert!(matches!(err, RequestError::MalformedRequest(ref m) if m.contains("DTSTART")));
    }

    #[test]
    fn test_inverted_range_is_malformed() {
        let inverted = body(Some("REQUEST"), "VFREEBUSY")
            .replace("DTSTART:20110101T080000Z", "DTSTART:20110101T190000Z");

        let err = parse_request(&inverted)
            .unwrap()
            .validate(&[ORGANIZER.to_string()])
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
