//! On-disk settings of principals and calendars.

use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::backend::CalendarTransparency;
use crate::error::{ScheduleError, ScheduleResult};

fn default_true() -> bool {
    true
}

/// principals/<user>/principal.toml
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PrincipalConfig {
    /// calendar-user-address-set, e.g. `mailto:alice@example.org`
    #[serde(default)]
    pub addresses: Vec<String>,

    #[serde(default = "default_true")]
    pub home: bool,

    #[serde(default = "default_true")]
    pub inbox: bool,
}

impl PrincipalConfig {
    /// None when the principal has no principal.toml.
    pub async fn load(principal_dir: &Path) -> ScheduleResult<Option<Self>> {
        let path = principal_dir.join("principal.toml");

        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let config = toml::from_str(&content)
            .map_err(|e| ScheduleError::Config(format!("{}: {e}", path.display())))?;
        Ok(Some(config))
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transp {
    #[default]
    Opaque,
    Transparent,
}

impl From<Transp> for CalendarTransparency {
    fn from(transp: Transp) -> Self {
        match transp {
            Transp::Opaque => CalendarTransparency::Opaque,
            Transp::Transparent => CalendarTransparency::Transparent,
        }
    }
}

/// calendars/<user>/<calendar>/.caldir/config.toml
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct CalendarConfig {
    #[serde(default)]
    pub transp: Transp,

    /// IANA zone for floating times, e.g. "Europe/Berlin"
    pub timezone: Option<String>,
}

impl CalendarConfig {
    /// Defaults when the calendar has no config file.
    pub async fn load(calendar_dir: &Path) -> ScheduleResult<Self> {
        let path = calendar_dir.join(".caldir/config.toml");

        if !tokio::fs::try_exists(&path).await? {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        toml::from_str(&content).map_err(|e| ScheduleError::Config(format!("{}: {e}", path.display())))
    }

    pub async fn save(&self, calendar_dir: &Path) -> ScheduleResult<()> {
        let dir = calendar_dir.join(".caldir");
        tokio::fs::create_dir_all(&dir).await?;

        let content =
            toml::to_string_pretty(self).map_err(|e| ScheduleError::Config(e.to_string()))?;
        tokio::fs::write(dir.join("config.toml"), content).await?;

        Ok(())
    }

    /// Unknown zone names are ignored.
    pub fn tz(&self) -> Option<Tz> {
        let name = self.timezone.as_deref()?;
        match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                tracing::warn!(timezone = name, "Unknown calendar timezone, using UTC");
                None
            }
        }
    }
}
