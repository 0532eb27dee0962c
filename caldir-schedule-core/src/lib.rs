//! Free/busy scheduling engine for caldir.
//!
//! Answers iTIP `METHOD:REQUEST` VFREEBUSY messages posted to a CalDAV
//! scheduling outbox:
//! - `request` parses and validates the posted calendar data
//! - `principal` and `locator` find each attendee's principal, calendar home,
//!   inbox and declared availability
//! - `calculator` turns stored events and availability into busy intervals
//! - `response` renders the `schedule-response` document
//! - `dispatcher` ties these together with bounded per-attendee concurrency
//!
//! Storage, the principal directory and the property layer are reached through
//! the traits in `backend`; `fs::FsBackend` implements them over a directory tree.

pub mod access;
pub mod address;
pub mod availability;
pub mod backend;
pub mod calculator;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fs;
pub mod ics;
pub mod interval;
pub mod locator;
pub mod outcome;
pub mod principal;
pub mod request;
pub mod response;
pub mod time_range;

#[cfg(test)]
mod testing;

pub use access::{AccessDecision, AccessPolicy, Authorizer, PolicyAuthorizer};
pub use address::CalendarAddress;
pub use backend::{Collaborators, PrincipalRef};
pub use config::{DispatchLimits, ScheduleConfig};
pub use dispatcher::{Dispatcher, OutboxPost};
pub use error::{RequestError, ScheduleError, ScheduleResult};
pub use fs::FsBackend;
pub use outcome::{AttendeeOutcome, AttendeeStatus};
pub use response::ScheduleResponse;
