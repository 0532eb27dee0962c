//! Assembly of the multi-recipient `schedule-response` document.

use chrono::{DateTime, Utc};

use crate::ics::{FreeBusyReply, generate_freebusy_reply};
use crate::outcome::{AttendeeOutcome, AttendeeStatus};
use crate::request::SchedulingRequest;

pub const RESPONSE_CONTENT_TYPE: &str = "application/xml";

/// What the transport layer sends back for a handled request.
#[derive(Debug, Clone)]
pub struct ScheduleResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub outcomes: Vec<AttendeeOutcome>,
}

/// Build the response for `outcomes`, one `cal:response` per entry in order.
///
/// Every success entry carries a METHOD:REPLY VFREEBUSY sharing the request's
/// UID (a fresh one when the request had none) and `dtstamp`.
pub fn assemble_response(
    request: &SchedulingRequest,
    outcomes: Vec<AttendeeOutcome>,
    dtstamp: DateTime<Utc>,
) -> ScheduleResponse {
    let uid = request
        .uid
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut body = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?>
<cal:schedule-response xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">
"#,
    );

    for outcome in &outcomes {
        let calendar_data = match &outcome.status {
            AttendeeStatus::Success(data) => {
                let ics = generate_freebusy_reply(&FreeBusyReply {
                    uid: &uid,
                    dtstamp,
                    organizer: &request.organizer,
                    attendee: &outcome.address,
                    range: &data.range,
                    intervals: &data.intervals,
                });
                format!(
                    "    <cal:calendar-data>{}</cal:calendar-data>\n",
                    escape_xml(&ics)
                )
            }
            _ => String::new(),
        };

        body.push_str(&format!(
            r#"  <cal:response>
    <cal:recipient>
      <d:href>{}</d:href>
    </cal:recipient>
    <cal:request-status>{}</cal:request-status>
{}  </cal:response>
"#,
            escape_xml(outcome.address.as_str()),
            escape_xml(&outcome.status.request_status()),
            calendar_data
        ));
    }

    body.push_str("</cal:schedule-response>\n");

    ScheduleResponse {
        status: 200,
        content_type: RESPONSE_CONTENT_TYPE,
        body,
        outcomes,
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\r' => escaped.push_str("&#13;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::CalendarAddress;
    use crate::interval::{BusyInterval, BusyKind};
    use crate::outcome::FreeBusyData;
    use crate::time_range::TimeRange;
    use chrono::TimeZone;

    const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2011, 1, 1, hour, 0, 0).unwrap()
    }

    fn request(uid: Option<&str>) -> SchedulingRequest {
        SchedulingRequest {
            uid: uid.map(str::to_string),
            organizer: CalendarAddress::new("mailto:user1@example.org"),
            attendees: vec![
                CalendarAddress::new("mailto:user2@example.org"),
                CalendarAddress::new("mailto:user3@example.org"),
            ],
            range: TimeRange::new(at(8), at(18)).unwrap(),
        }
    }

    #[test]
    fn test_document_lists_recipients_in_order() {
        let request = request(Some("fb-1"));
        let outcomes = vec![
            AttendeeOutcome {
                address: request.attendees[0].clone(),
                status: AttendeeStatus::Success(FreeBusyData {
                    range: request.range,
                    intervals: vec![BusyInterval::new(
                        TimeRange::new(at(9), at(10)).unwrap(),
                        BusyKind::Busy,
                    )],
                }),
            },
            AttendeeOutcome {
                address: request.attendees[1].clone(),
                status: AttendeeStatus::PrincipalNotFound,
            },
        ];

        let response = assemble_response(&request, outcomes, at(7));
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/xml");

        let doc = roxmltree::Document::parse(&response.body).unwrap();
        let root = doc.root_element();
        assert!(root.has_tag_name((CALDAV_NS, "schedule-response")));

        let responses: Vec<_> = root
            .children()
            .filter(|n| n.has_tag_name((CALDAV_NS, "response")))
            .collect();
        assert_eq!(responses.len(), 2);

        let hrefs: Vec<&str> = responses
            .iter()
            .filter_map(|r| r.descendants().find(|n| n.has_tag_name(("DAV:", "href"))))
            .filter_map(|n| n.text())
            .collect();
        assert_eq!(
            hrefs,
            vec!["mailto:user2@example.org", "mailto:user3@example.org"]
        );

        let statuses: Vec<&str> = responses
            .iter()
            .filter_map(|r| r.descendants().find(|n| n.has_tag_name((CALDAV_NS, "request-status"))))
            .filter_map(|n| n.text())
            .collect();
        assert_eq!(statuses, vec!["2.0;Success", "3.7;Could not find principal"]);

        let calendar_data = responses[0]
            .descendants()
            .find(|n| n.has_tag_name((CALDAV_NS, "calendar-data")))
            .and_then(|n| n.text())
            .unwrap();
        assert!(calendar_data.contains("UID:fb-1\r\n"));
        assert!(calendar_data.contains("FREEBUSY:20110101T090000Z/20110101T100000Z\r\n"));
        assert!(
            !responses[1]
                .descendants()
                .any(|n| n.has_tag_name((CALDAV_NS, "calendar-data")))
        );
    }

    #[test]
    fn test_missing_uid_is_generated_and_shared() {
        let request = request(None);
        let data = FreeBusyData {
            range: request.range,
            intervals: Vec::new(),
        };
        let outcomes = request
            .attendees
            .iter()
            .map(|a| AttendeeOutcome {
                address: a.clone(),
                status: AttendeeStatus::Success(data.clone()),
            })
            .collect();

        let response = assemble_response(&request, outcomes, at(7));
        let doc = roxmltree::Document::parse(&response.body).unwrap();
        let uids: Vec<String> = doc
            .descendants()
            .filter(|n| n.has_tag_name((CALDAV_NS, "calendar-data")))
            .filter_map(|n| n.text())
            .filter_map(|ics| ics.lines().find(|l| l.starts_with("UID:")).map(str::to_string))
            .collect();

        assert_eq!(uids.len(), 2);
        assert_eq!(uids[0], uids[1]);
        assert!(uids[0].len() > "UID:".len());
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
