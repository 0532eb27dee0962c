//! Filesystem-backed collaborators.
//!
//! ```text
//! <root>/principals/<user>/principal.toml
//! <root>/principals/<user>/availability.ics      (optional)
//! <root>/calendars/<user>/<calendar>/*.ics
//! <root>/calendars/<user>/<calendar>/.caldir/config.toml
//! ```
//!
//! `calendars/<user>/inbox` and `calendars/<user>/outbox` are reserved and
//! never listed as calendars.

mod config;

pub use self::config::{CalendarConfig, PrincipalConfig, Transp};

use std::path::{Path, PathBuf};

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

const PRINCIPALS: &str = "principals";
const CALENDARS: &str = "calendars";
const RESERVED: [&str; 2] = ["inbox", "outbox"];

#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBackend { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Split a resource path, rejecting anything that could leave the root.
    fn segments(path: &str) -> ScheduleResult<Vec<&str>> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments.iter().any(|s| s.is_empty() || s.starts_with('.') || s.contains('\\')) {
            return Err(ScheduleError::Backend(format!("Invalid resource path: {path}")));
        }
        Ok(segments)
    }

    fn principal_dir(&self, user: &str) -> PathBuf {
        self.root.join(PRINCIPALS).join(user)
    }

    /// The user of a `principals/<user>` reference.
    fn principal_user(principal: &PrincipalRef) -> ScheduleResult<Option<String>> {
        Ok(match Self::segments(principal.as_str())?.as_slice() {
            [PRINCIPALS, user] => Some(user.to_string()),
            _ => None,
        })
    }

    async fn principal_config(&self, user: &str) -> ScheduleResult<Option<PrincipalConfig>> {
        PrincipalConfig::load(&self.principal_dir(user)).await
    }

    fn calendar_dir(&self, calendar: &CalendarRef) -> ScheduleResult<PathBuf> {
        match Self::segments(&calendar.href)?.as_slice() {
            [CALENDARS, user, name] if !RESERVED.contains(name) => {
                Ok(self.root.join(CALENDARS).join(user).join(name))
            }
            _ => Err(ScheduleError::Backend(format!("Not a calendar: {}", calendar.href))),
        }
    }

    /// Directory entries of `dir` sorted by name; empty when `dir` does not exist.
    async fn sorted_entries(dir: &Path) -> ScheduleResult<Vec<(String, PathBuf)>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                found.push((name.to_string(), entry.path()));
            }
        }
        found.sort();
        Ok(found)
    }
}

#[async_trait]
impl ResourceTree for FsBackend {
    async fn node_kind(&self, path: &str) -> ScheduleResult<Option<NodeKind>> {
        let Ok(segments) = Self::segments(path) else {
            return Ok(None);
        };

        let (root, user) = match segments.as_slice() {
            [root, user, ..] => (*root, *user),
            _ => return Ok(None),
        };
        let Some(principal) = self.principal_config(user).await? else {
            return Ok(None);
        };
        let owner = PrincipalRef::new(format!("{PRINCIPALS}/{user}"));

        Ok(match (root, &segments[2..]) {
            (PRINCIPALS, []) => Some(NodeKind::Principal),
            (CALENDARS, []) if principal.home => Some(NodeKind::CalendarHome { owner }),
            (CALENDARS, ["outbox"]) => Some(NodeKind::Outbox { owner }),
            (CALENDARS, ["inbox"]) if principal.inbox => Some(NodeKind::Inbox { owner }),
            (CALENDARS, [name]) if !RESERVED.contains(name) => {
                let dir = self.root.join(CALENDARS).join(user).join(name);
                tokio::fs::metadata(&dir)
                    .await
                    .is_ok_and(|m| m.is_dir())
                    .then_some(NodeKind::Calendar { owner })
            }
            _ => None,
        })
    }
}

#[async_trait]
impl PrincipalDirectory for FsBackend {
    async fn principals_by_address(
        &self,
        address: &CalendarAddress,
    ) -> ScheduleResult<Vec<PrincipalRef>> {
        let mut found = Vec::new();

        for (user, dir) in Self::sorted_entries(&self.root.join(PRINCIPALS)).await? {
            if user.starts_with('.') {
                continue;
            }
            let config = match PrincipalConfig::load(&dir).await {
                Ok(Some(config)) => config,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(principal = %user, error = %e, "Skipping unreadable principal");
                    continue;
                }
            };

            if config.addresses.iter().any(|a| address.matches(a)) {
                found.push(PrincipalRef::new(format!("{PRINCIPALS}/{user}")));
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl PropertySource for FsBackend {
    async fn fetch_properties(
        &self,
        principal: &PrincipalRef,
        names: &[PropertyName],
    ) -> ScheduleResult<PropertyMap> {
        let Some(user) = Self::principal_user(principal)? else {
            return Ok(PropertyMap::new());
        };
        let Some(config) = self.principal_config(&user).await? else {
            return Ok(PropertyMap::new());
        };

        let mut properties = PropertyMap::new();
        for name in names {
            let status = match name {
                PropertyName::CalendarHomeSet if config.home => PropertyStatus::Found(
                    PropertyValue::Hrefs(vec![format!("{CALENDARS}/{user}")]),
                ),
                PropertyName::ScheduleInboxUrl if config.inbox => PropertyStatus::Found(
                    PropertyValue::Hrefs(vec![format!("{CALENDARS}/{user}/inbox")]),
                ),
                PropertyName::CalendarAvailability => {
                    let path = self.principal_dir(&user).join("availability.ics");
                    match tokio::fs::read_to_string(&path).await {
                        Ok(ics) => PropertyStatus::Found(PropertyValue::Text(ics)),
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => PropertyStatus::Absent,
                        Err(e) => return Err(e.into()),
                    }
                }
                PropertyName::CalendarUserAddressSet => {
                    PropertyStatus::Found(PropertyValue::Hrefs(config.addresses.clone()))
                }
                _ => PropertyStatus::Absent,
            };
            properties.insert(*name, status);
        }

        Ok(properties)
    }
}

#[async_trait]
impl CalendarStore for FsBackend {
    async fn list_calendars(&self, calendar_home: &str) -> ScheduleResult<Vec<CalendarRef>> {
        let user = match Self::segments(calendar_home)?.as_slice() {
            [CALENDARS, user] => user.to_string(),
            _ => {
                return Err(ScheduleError::Backend(format!(
                    "Not a calendar home: {calendar_home}"
                )));
            }
        };

        let mut calendars = Vec::new();
        for (name, path) in Self::sorted_entries(&self.root.join(CALENDARS).join(&user)).await? {
            if name.starts_with('.') || RESERVED.contains(&name.as_str()) {
                continue;
            }
            if tokio::fs::metadata(&path).await?.is_dir() {
                calendars.push(CalendarRef {
                    href: format!("{CALENDARS}/{user}/{name}"),
                });
            }
        }

        Ok(calendars)
    }

    async fn calendar_transparency(
        &self,
        calendar: &CalendarRef,
    ) -> ScheduleResult<CalendarTransparency> {
        let config = CalendarConfig::load(&self.calendar_dir(calendar)?).await?;
        Ok(config.transp.into())
    }

    async fn calendar_timezone(&self, calendar: &CalendarRef) -> ScheduleResult<Option<Tz>> {
        let config = CalendarConfig::load(&self.calendar_dir(calendar)?).await?;
        Ok(config.tz())
    }

    async fn objects_in_range(
        &self,
        calendar: &CalendarRef,
        range: &TimeRange,
    ) -> ScheduleResult<Vec<String>> {
        let dir = self.calendar_dir(calendar)?;
        let floating = CalendarConfig::load(&dir).await?.tz().unwrap_or(Tz::UTC);

        let mut objects = Vec::new();
        for (name, path) in Self::sorted_entries(&dir).await? {
            if !name.ends_with(".ics") {
                continue;
            }

            let raw = tokio::fs::read_to_string(&path).await?;
            match overlaps_window(&raw, range, floating) {
                Ok(true) => objects.push(raw),
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(file = %path.display(), error = %e, "Skipping unparseable calendar object");
                }
            }
        }

        Ok(objects)
    }
}
