//! In-memory collaborators for engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;

use crate::address::CalendarAddress;
use crate::backend::{
    CalendarRef, CalendarStore, CalendarTransparency, NodeKind, PrincipalDirectory, PrincipalRef,
    PropertyMap, PropertyName, PropertySource, PropertyStatus, PropertyValue, ResourceTree,
};
use crate::error::{ScheduleError, ScheduleResult};
use crate::ics::overlaps_window;
use crate::time_range::TimeRange;

/// A VCALENDAR holding one VEVENT.
pub(crate) fn event(uid: &str, start: &str, end: &str) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//EN\r\nBEGIN:VEVENT\r\nUID:{uid}\r\nDTSTART:{start}\r\nDTEND:{end}\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n"
    )
}

struct MemoryPrincipal {
    user: String,
    addresses: Vec<String>,
    home: bool,
    inbox: bool,
    availability: Option<String>,
    failing: bool,
    delay: Option<Duration>,
}

struct MemoryCalendar {
    user: String,
    name: String,
    transparency: CalendarTransparency,
    timezone: Option<Tz>,
    objects: Vec<String>,
}

impl MemoryCalendar {
    fn href(&self) -> String {
        format!("calendars/{}/{}", self.user, self.name)
    }
}

/// Principals and calendars held in memory, in insertion order.
#[derive(Default)]
pub(crate) struct MemoryBackend {
    principals: Vec<MemoryPrincipal>,
    calendars: Vec<MemoryCalendar>,
    lookup_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    abandoned_fetches: AtomicUsize,
}

/// Counts a delayed property fetch as abandoned unless it runs to the end.
struct FetchGuard<'a> {
    abandoned: &'a AtomicUsize,
    finished: bool,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl MemoryBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Principal `principals/<user>` with a home and inbox.
    pub(crate) fn with_principal(mut self, user: &str, addresses: &[&str]) -> Self {
        self.principals.push(MemoryPrincipal {
            user: user.to_string(),
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            home: true,
            inbox: true,
            availability: None,
            failing: false,
            delay: None,
        });
        self
    }

    pub(crate) fn without_home(mut self, user: &str) -> Self {
        self.principal_mut(user, |p| p.home = false);
        self
    }

    pub(crate) fn without_inbox(mut self, user: &str) -> Self {
        self.principal_mut(user, |p| p.inbox = false);
        self
    }

    pub(crate) fn with_availability(mut self, user: &str, ics: &str) -> Self {
        self.principal_mut(user, |p| p.availability = Some(ics.to_string()));
        self
    }

    /// Property lookups for `user` fail.
    pub(crate) fn failing_properties(mut self, user: &str) -> Self {
        self.principal_mut(user, |p| p.failing = true);
        self
    }

    /// Property lookups for `user` take `delay`.
    pub(crate) fn slow_properties(mut self, user: &str, delay: Duration) -> Self {
        self.principal_mut(user, |p| p.delay = Some(delay));
        self
    }

    /// Every address lookup takes `delay`.
    pub(crate) fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    pub(crate) fn with_calendar(
        mut self,
        user: &str,
        name: &str,
        transparency: CalendarTransparency,
        objects: Vec<String>,
    ) -> Self {
        self.calendars.push(MemoryCalendar {
            user: user.to_string(),
            name: name.to_string(),
            transparency,
            timezone: None,
            objects,
        });
        self
    }

    pub(crate) fn with_calendar_timezone(mut self, user: &str, name: &str, tz: Tz) -> Self {
        if let Some(calendar) = self
            .calendars
            .iter_mut()
            .find(|c| c.user == user && c.name == name)
        {
            calendar.timezone = Some(tz);
        }
        self
    }

    /// Most address lookups observed running at once.
    pub(crate) fn peak_lookups(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Delayed property fetches that were dropped before finishing.
    pub(crate) fn abandoned_fetches(&self) -> usize {
        self.abandoned_fetches.load(Ordering::SeqCst)
    }

    fn principal_mut(&mut self, user: &str, f: impl FnOnce(&mut MemoryPrincipal)) {
        if let Some(principal) = self.principals.iter_mut().find(|p| p.user == user) {
            f(principal);
        }
    }

    fn principal(&self, principal: &PrincipalRef) -> Option<&MemoryPrincipal> {
        let user = principal.as_str().strip_prefix("principals/")?;
        self.principals.iter().find(|p| p.user == user)
    }

    fn calendar(&self, calendar: &CalendarRef) -> Option<&MemoryCalendar> {
        self.calendars.iter().find(|c| c.href() == calendar.href)
    }
}

#[async_trait]
impl ResourceTree for MemoryBackend {
    async fn node_kind(&self, path: &str) -> ScheduleResult<Option<NodeKind>> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let known = |user: &str| self.principals.iter().any(|p| p.user == user);
        let owner = |user: &str| PrincipalRef::new(format!("principals/{user}"));

        Ok(match segments.as_slice() {
            ["principals", user] if known(*user) => Some(NodeKind::Principal),
            ["calendars", user] if known(*user) => Some(NodeKind::CalendarHome { owner: owner(*user) }),
            ["calendars", user, "outbox"] if known(*user) => Some(NodeKind::Outbox { owner: owner(*user) }),
            ["calendars", user, "inbox"] if known(*user) => Some(NodeKind::Inbox { owner: owner(*user) }),
            ["calendars", user, name]
                if self.calendars.iter().any(|c| c.user == **user && c.name == **name) =>
            {
                Some(NodeKind::Calendar { owner: owner(*user) })
            }
            _ => None,
        })
    }
}

#[async_trait]
impl PrincipalDirectory for MemoryBackend {
    async fn principals_by_address(
        &self,
        address: &CalendarAddress,
    ) -> ScheduleResult<Vec<PrincipalRef>> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }

        let found = self
            .principals
            .iter()
            .filter(|p| p.addresses.iter().any(|a| address.matches(a)))
            .map(|p| PrincipalRef::new(format!("principals/{}", p.user)))
            .collect();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(found)
    }
}

#[async_trait]
impl PropertySource for MemoryBackend {
    async fn fetch_properties(
        &self,
        principal: &PrincipalRef,
        names: &[PropertyName],
    ) -> ScheduleResult<PropertyMap> {
        let Some(found) = self.principal(principal) else {
            return Ok(PropertyMap::new());
        };

        if let Some(delay) = found.delay {
            let mut guard = FetchGuard {
                abandoned: &self.abandoned_fetches,
                finished: false,
            };
            tokio::time::sleep(delay).await;
            guard.finished = true;
        }
        if found.failing {
            return Err(ScheduleError::Backend(format!("property store unavailable for {principal}")));
        }

        let href_if = |present: bool, href: String| {
            if present {
                PropertyStatus::Found(PropertyValue::Hrefs(vec![href]))
            } else {
                PropertyStatus::Absent
            }
        };

        Ok(names
            .iter()
            .map(|name| {
                let status = match name {
                    PropertyName::CalendarHomeSet => {
                        href_if(found.home, format!("calendars/{}", found.user))
                    }
                    PropertyName::ScheduleInboxUrl => {
                        href_if(found.inbox, format!("calendars/{}/inbox", found.user))
                    }
                    PropertyName::CalendarAvailability => match &found.availability {
                        Some(ics) => PropertyStatus::Found(PropertyValue::Text(ics.clone())),
                        None => PropertyStatus::Absent,
                    },
                    PropertyName::CalendarUserAddressSet => {
                        PropertyStatus::Found(PropertyValue::Hrefs(found.addresses.clone()))
                    }
                };
                (*name, status)
            })
            .collect())
    }
}

#[async_trait]
impl CalendarStore for MemoryBackend {
    async fn list_calendars(&self, calendar_home: &str) -> ScheduleResult<Vec<CalendarRef>> {
        let home = calendar_home.trim_matches('/');
        Ok(self
            .calendars
            .iter()
            .filter(|c| format!("calendars/{}", c.user) == home)
            .map(|c| CalendarRef { href: c.href() })
            .collect())
    }

    async fn calendar_transparency(
        &self,
        calendar: &CalendarRef,
    ) -> ScheduleResult<CalendarTransparency> {
        Ok(self
            .calendar(calendar)
            .map(|c| c.transparency)
            .unwrap_or_default())
    }

    async fn calendar_timezone(&self, calendar: &CalendarRef) -> ScheduleResult<Option<Tz>> {
        Ok(self.calendar(calendar).and_then(|c| c.timezone))
    }

    async fn objects_in_range(
        &self,
        calendar: &CalendarRef,
        range: &TimeRange,
    ) -> ScheduleResult<Vec<String>> {
        let Some(found) = self.calendar(calendar) else {
            return Ok(Vec::new());
        };
        let tz = found.timezone.unwrap_or(Tz::UTC);

        Ok(found
            .objects
            .iter()
            .filter(|raw| overlaps_window(raw, range, tz).unwrap_or(true))
            .cloned()
            .collect())
    }
}
