//! Per-attendee results.

use crate::address::CalendarAddress;
use crate::interval::BusyInterval;
use crate::time_range::TimeRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeBusyData {
    pub range: TimeRange,
    pub intervals: Vec<BusyInterval>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendeeStatus {
    Success(FreeBusyData),
    PrincipalNotFound,
    NoCalendarHome,
    NoInboxFound,
    OtherFailure(String),
}

impl AttendeeStatus {
    /// iTIP REQUEST-STATUS value, `code;text`.
    pub fn request_status(&self) -> String {
        match self {
            AttendeeStatus::Success(_) => "2.0;Success".to_string(),
            AttendeeStatus::PrincipalNotFound => "3.7;Could not find principal".to_string(),
            AttendeeStatus::NoCalendarHome => "3.7;No calendar-home-set property found".to_string(),
            AttendeeStatus::NoInboxFound => "3.7;No schedule-inbox-URL property found".to_string(),
            AttendeeStatus::OtherFailure(detail) => {
                format!("5.1;Could not complete free/busy lookup: {detail}")
            }
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            AttendeeStatus::Success(_) => "success",
            AttendeeStatus::PrincipalNotFound => "principal-not-found",
            AttendeeStatus::NoCalendarHome => "no-calendar-home",
            AttendeeStatus::NoInboxFound => "no-inbox",
            AttendeeStatus::OtherFailure(_) => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendeeOutcome {
    /// Exactly as written in the request.
    pub address: CalendarAddress,
    pub status: AttendeeStatus,
}
