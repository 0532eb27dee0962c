//! iCalendar reading and writing.
//!
//! Parsing goes through the icalendar crate's parser; recurrence expansion
//! through the rrule crate.

mod generate;
mod occurrences;
pub(crate) mod time;

pub use generate::{FreeBusyReply, PRODID, generate_freebusy_reply};
pub(crate) use occurrences::expand_components;
pub use occurrences::{busy_occurrences, overlaps_window};
