//! Calendar user addresses.

use std::fmt;

/// A calendar user address as written in ORGANIZER/ATTENDEE or a principal's
/// calendar-user-address-set, e.g. `mailto:alice@example.org`.
///
/// The raw form is kept for echoing back to clients; comparisons go through
/// [`CalendarAddress::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarAddress(String);

impl CalendarAddress {
    pub fn new(raw: impl Into<String>) -> Self {
        CalendarAddress(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased address with a leading `mailto:` scheme removed.
    pub fn normalized(&self) -> String {
        normalize_address(&self.0)
    }

    /// Case-insensitive comparison on the normalized form.
    pub fn matches(&self, other: &str) -> bool {
        self.normalized() == normalize_address(other)
    }
}

impl fmt::Display for CalendarAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => &trimmed[7..],
        _ => trimmed,
    };
    without_scheme.to_lowercase()
}
