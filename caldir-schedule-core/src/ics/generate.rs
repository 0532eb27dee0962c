//! VFREEBUSY reply generation.

use chrono::{DateTime, Utc};

use crate::address::CalendarAddress;
use crate::interval::{BusyInterval, BusyKind};
use crate::time_range::TimeRange;

pub const PRODID: &str = "-//caldir//caldir-schedule//EN";

/// RFC 5545 caps content lines at 75 octets, excluding CRLF.
const MAX_LINE_OCTETS: usize = 75;

/// Fields of one attendee's METHOD:REPLY free/busy object.
pub struct FreeBusyReply<'a> {
    pub uid: &'a str,
    pub dtstamp: DateTime<Utc>,
    pub organizer: &'a CalendarAddress,
    pub attendee: &'a CalendarAddress,
    pub range: &'a TimeRange,
    pub intervals: &'a [BusyInterval],
}

/// Render a VCALENDAR with METHOD:REPLY and a single VFREEBUSY.
///
/// Plain busy time gets a bare `FREEBUSY:` line (BUSY is the default FBTYPE);
/// every other kind is tagged.
pub fn generate_freebusy_reply(reply: &FreeBusyReply<'_>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{PRODID}"),
        "METHOD:REPLY".to_string(),
        "BEGIN:VFREEBUSY".to_string(),
        format!("UID:{}", reply.uid),
        format!("DTSTAMP:{}", TimeRange::format_utc(&reply.dtstamp)),
        format!("DTSTART:{}", TimeRange::format_utc(&reply.range.start)),
        format!("DTEND:{}", TimeRange::format_utc(&reply.range.end)),
        format!("ORGANIZER:{}", reply.organizer),
        format!("ATTENDEE:{}", reply.attendee),
    ];

    for interval in reply.intervals {
        lines.push(freebusy_line(interval));
    }

    lines.push("END:VFREEBUSY".to_string());
    lines.push("END:VCALENDAR".to_string());

    let mut output = String::new();
    for line in &lines {
        fold_line(line, &mut output);
    }
    output
}

fn freebusy_line(interval: &BusyInterval) -> String {
    let period = format!(
        "{}/{}",
        TimeRange::format_utc(&interval.start),
        TimeRange::format_utc(&interval.end)
    );

    match interval.kind {
        BusyKind::Busy => format!("FREEBUSY:{period}"),
        kind => format!("FREEBUSY;FBTYPE={}:{period}", kind.fbtype()),
    }
}

/// Append `line` with CRLF, folding at 75 octets without splitting a UTF-8 sequence.
fn fold_line(line: &str, output: &mut String) {
    let mut budget = MAX_LINE_OCTETS;
    let mut used = 0;

    for ch in line.chars() {
        if used + ch.len_utf8() > budget {
            output.push_str("\r\n ");
            // The leading space counts against the continuation line
            budget = MAX_LINE_OCTETS - 1;
            used = 0;
        }
        output.push(ch);
        used += ch.len_utf8();
    }

    output.push_str("\r\n");
}
