//! Scheduling server configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::access::AccessPolicy;
use crate::error::{ScheduleError, ScheduleResult};

static DEFAULT_DATA_DIR: &str = "~/calendar-server";
static DEFAULT_BIND: &str = "127.0.0.1:4096";
const DEFAULT_MAX_CONCURRENCY: usize = 8;
static DEFAULT_ATTENDEE_TIMEOUT: &str = "10s";
static DEFAULT_REQUEST_DEADLINE: &str = "30s";

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_attendee_timeout() -> String {
    DEFAULT_ATTENDEE_TIMEOUT.to_string()
}

fn default_request_deadline() -> String {
    DEFAULT_REQUEST_DEADLINE.to_string()
}

/// Configuration at ~/.config/caldir/schedule.toml
///
/// Every key can be overridden with a `CALDIR_SCHEDULE_<KEY>` environment variable.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// Root of the filesystem backend (principals/ and calendars/ live here)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_bind")]
    pub bind: String,

    /// Upper bound on attendees processed at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Humantime duration, e.g. "10s"
    #[serde(default = "default_attendee_timeout")]
    pub attendee_timeout: String,

    /// Humantime duration for the whole transaction
    #[serde(default = "default_request_deadline")]
    pub request_deadline: String,

    #[serde(default)]
    pub admin_principals: Vec<String>,

    #[serde(default)]
    pub default_access: AccessPolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            data_dir: default_data_dir(),
            bind: default_bind(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            attendee_timeout: default_attendee_timeout(),
            request_deadline: default_request_deadline(),
            admin_principals: Vec::new(),
            default_access: AccessPolicy::default(),
        }
    }
}

/// Limits the dispatcher applies to one scheduling transaction.
#[derive(Debug, Clone, Copy)]
pub struct DispatchLimits {
    pub max_concurrency: usize,
    pub attendee_timeout: Duration,
    pub request_deadline: Duration,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        DispatchLimits {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            attendee_timeout: Duration::from_secs(10),
            request_deadline: Duration::from_secs(30),
        }
    }
}

impl ScheduleConfig {
    pub fn config_path() -> ScheduleResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ScheduleError::Config("Could not determine config directory".into()))?
            .join("caldir");

        Ok(config_dir.join("schedule.toml"))
    }

    /// Load from the default location, writing a commented default file on first run.
    pub fn load() -> ScheduleResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> ScheduleResult<Self> {
        let config: ScheduleConfig = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("CALDIR_SCHEDULE")
                    .list_separator(",")
                    .with_list_parse_key("admin_principals")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ScheduleError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ScheduleError::Config(e.to_string()))?;

        // Fail early on bad durations or limits
        config.dispatch_limits()?;

        Ok(config)
    }

    pub fn data_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned();

        PathBuf::from(full_path_str)
    }

    pub fn dispatch_limits(&self) -> ScheduleResult<DispatchLimits> {
        if self.max_concurrency == 0 {
            return Err(ScheduleError::Config(
                "max_concurrency must be at least 1".into(),
            ));
        }

        Ok(DispatchLimits {
            max_concurrency: self.max_concurrency,
            attendee_timeout: parse_duration("attendee_timeout", &self.attendee_timeout)?,
            request_deadline: parse_duration("request_deadline", &self.request_deadline)?,
        })
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> ScheduleResult<()> {
        let contents = format!(
            "\
# caldir scheduling server configuration

# Where principals and calendars live:
# data_dir = \"{DEFAULT_DATA_DIR}\"

# Address to listen on:
# bind = \"{DEFAULT_BIND}\"

# Attendees looked up in parallel, and how long each may take:
# max_concurrency = {DEFAULT_MAX_CONCURRENCY}
# attendee_timeout = \"{DEFAULT_ATTENDEE_TIMEOUT}\"
# request_deadline = \"{DEFAULT_REQUEST_DEADLINE}\"

# Principals that may query anyone's free/busy:
# admin_principals = [\"principals/admin\"]

# Everyone else: \"self-only\" or \"allow-all\"
# default_access = \"self-only\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScheduleError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ScheduleError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

fn parse_duration(key: &str, value: &str) -> ScheduleResult<Duration> {
    let duration = humantime::parse_duration(value)
        .map_err(|e| ScheduleError::Config(format!("Invalid {key} '{value}': {e}")))?;

    if duration.is_zero() {
        return Err(ScheduleError::Config(format!("{key} must be greater than zero")));
    }

    Ok(duration)
}
