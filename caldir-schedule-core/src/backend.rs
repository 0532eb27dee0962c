//! Contracts for the server substrate the engine runs on.
//!
//! The engine never touches storage, the principal directory or the property
//! layer directly; it goes through these traits. [`crate::fs::FsBackend`] is
//! the filesystem implementation, tests use in-memory fakes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;

use crate::access::Authorizer;
use crate::address::CalendarAddress;
use crate::error::ScheduleResult;
use crate::time_range::TimeRange;

/// Path of a principal resource, e.g. `principals/user1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrincipalRef(String);

impl PrincipalRef {
    pub fn new(path: impl Into<String>) -> Self {
        PrincipalRef(path.into().trim_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A calendar collection under some calendar home.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarRef {
    pub href: String,
}

/// The `schedule-calendar-transp` setting of a calendar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CalendarTransparency {
    #[default]
    Opaque,
    Transparent,
}

/// What kind of resource sits at a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Outbox { owner: PrincipalRef },
    Inbox { owner: PrincipalRef },
    CalendarHome { owner: PrincipalRef },
    Calendar { owner: PrincipalRef },
    Principal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyName {
    CalendarHomeSet,
    ScheduleInboxUrl,
    CalendarAvailability,
    CalendarUserAddressSet,
}

impl PropertyName {
    pub fn clark_notation(&self) -> &'static str {
        match self {
            PropertyName::CalendarHomeSet => "{urn:ietf:params:xml:ns:caldav}calendar-home-set",
            PropertyName::ScheduleInboxUrl => "{urn:ietf:params:xml:ns:caldav}schedule-inbox-URL",
            PropertyName::CalendarAvailability => {
                "{urn:ietf:params:xml:ns:caldav}calendar-availability"
            }
            PropertyName::CalendarUserAddressSet => {
                "{urn:ietf:params:xml:ns:caldav}calendar-user-address-set"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Hrefs(Vec<String>),
    Text(String),
}

impl PropertyValue {
    /// First href, or the text itself.
    pub fn first_href(&self) -> Option<&str> {
        match self {
            PropertyValue::Hrefs(hrefs) => hrefs.first().map(String::as_str),
            PropertyValue::Text(text) => Some(text.as_str()),
        }
    }
}

/// Per-property result of a property-find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyStatus {
    Found(PropertyValue),
    Absent,
    Denied,
}

pub type PropertyMap = HashMap<PropertyName, PropertyStatus>;

#[async_trait]
pub trait ResourceTree: Send + Sync {
    /// None when nothing exists at `path`.
    async fn node_kind(&self, path: &str) -> ScheduleResult<Option<NodeKind>>;
}

#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Principals whose address set contains `address`, in the directory's own order.
    async fn principals_by_address(
        &self,
        address: &CalendarAddress,
    ) -> ScheduleResult<Vec<PrincipalRef>>;
}

#[async_trait]
pub trait PropertySource: Send + Sync {
    /// Batched property-find. Names missing from the returned map count as absent.
    async fn fetch_properties(
        &self,
        principal: &PrincipalRef,
        names: &[PropertyName],
    ) -> ScheduleResult<PropertyMap>;
}

#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn list_calendars(&self, calendar_home: &str) -> ScheduleResult<Vec<CalendarRef>>;

    async fn calendar_transparency(
        &self,
        calendar: &CalendarRef,
    ) -> ScheduleResult<CalendarTransparency>;

    /// Zone used for floating times in this calendar's objects.
    async fn calendar_timezone(&self, calendar: &CalendarRef) -> ScheduleResult<Option<Tz>>;

    /// Raw calendar objects with at least one occurrence overlapping `range`.
    async fn objects_in_range(
        &self,
        calendar: &CalendarRef,
        range: &TimeRange,
    ) -> ScheduleResult<Vec<String>>;
}

/// Everything a dispatcher needs from the surrounding server.
#[derive(Clone)]
pub struct Collaborators {
    pub tree: Arc<dyn ResourceTree>,
    pub directory: Arc<dyn PrincipalDirectory>,
    pub properties: Arc<dyn PropertySource>,
    pub store: Arc<dyn CalendarStore>,
    pub authorizer: Arc<dyn Authorizer>,
}

impl Collaborators {
    /// Use one backend for every storage-facing role.
    pub fn from_backend<B>(backend: Arc<B>, authorizer: Arc<dyn Authorizer>) -> Self
    where
        B: ResourceTree + PrincipalDirectory + PropertySource + CalendarStore + 'static,
    {
        Collaborators {
            tree: backend.clone(),
            directory: backend.clone(),
            properties: backend.clone(),
            store: backend,
            authorizer,
        }
    }
}
