//! Runtime constants and the JSON configuration file.
//!
//! Constants collect the tunable capture and maintenance values in one
//! place. [`AppConfig`] is loaded once at startup; any problem with it is a
//! fatal [`RecorderError::Config`] raised before capture begins.
//!
//! ```json
//! {
//!   "capture":  { "device": "eth0", "interval": 60, "networks": ["192.168.1.0/24"] },
//!   "database": { "path": "netrecorder.db", "retentionDays": 90 },
//!   "defaultGroup": "Other",
//!   "groups":   { "Servers": ["10.0.0.0/24"], "LAN": ["10.0.0.0/8"] }
//! }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::core::{DeviceGroup, GroupClassifier, NetworkBinding};
use crate::error::RecorderError;

/// Config file used when neither `--config` nor `CONFIG_FILE` is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// SQLite file used when the config has no `database.path`.
pub const DEFAULT_DATABASE_PATH: &str = "netrecorder.db";

/// Largest frame the capture device hands us (bytes).
pub const CAPTURE_SNAPLEN: i32 = 65535;

/// Kernel capture buffer size: room for 160 maximum-size frames (bytes).
pub const CAPTURE_BUFFER_SIZE: i32 = 160 * CAPTURE_SNAPLEN;

/// Read timeout of the capture handle, so the loop can notice shutdown (milliseconds).
pub const CAPTURE_READ_TIMEOUT_MS: i32 = 500;

/// Interval between retention pruning runs (seconds).
pub const RETENTION_CHECK_INTERVAL_SECS: u64 = 3600;

/// Largest accepted `database.retentionDays` (about a century).
pub const MAX_RETENTION_DAYS: u64 = 36_500;

/// Days covered by `report` when `--days` is not given.
pub const DEFAULT_REPORT_DAYS: u32 = 7;

/// Options consumed by the capture source and the recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub device: String,
    pub commit_interval: Duration,
    /// Empty means every decoded packet counts.
    pub networks: Vec<NetworkBinding>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseOptions {
    pub path: PathBuf,
    /// 0 keeps history forever.
    pub retention_days: u64,
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub capture: CaptureOptions,
    pub database: DatabaseOptions,
    pub default_group: String,
    /// In file order.
    pub groups: Vec<DeviceGroup>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    capture: RawCapture,
    #[serde(default)]
    database: RawDatabase,
    default_group: String,
    #[serde(default, deserialize_with = "ordered_groups")]
    groups: Vec<(String, Vec<String>)>,
}

#[derive(Deserialize)]
struct RawCapture {
    device: String,
    /// Seconds.
    interval: u64,
    #[serde(default)]
    networks: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawDatabase {
    path: Option<PathBuf>,
    #[serde(default)]
    retention_days: u64,
}

impl AppConfig {
    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, RecorderError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RecorderError::Io(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, RecorderError> {
        let raw: RawConfig = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, RecorderError> {
        if raw.capture.device.trim().is_empty() {
            return Err(RecorderError::Config("capture.device must not be empty".into()));
        }
        if raw.capture.interval == 0 {
            return Err(RecorderError::Config(
                "capture.interval must be greater than zero".into(),
            ));
        }
        if raw.database.retention_days > MAX_RETENTION_DAYS {
            return Err(RecorderError::Config(format!(
                "database.retentionDays must be at most {MAX_RETENTION_DAYS}, got {}",
                raw.database.retention_days
            )));
        }
        if raw.default_group.trim().is_empty() {
            return Err(RecorderError::Config("defaultGroup must not be empty".into()));
        }

        let networks = parse_subnets("capture.networks", &raw.capture.networks)?;

        let mut seen = HashSet::new();
        let mut groups = Vec::with_capacity(raw.groups.len());
        for (name, subnets) in raw.groups {
            if name == raw.default_group {
                return Err(RecorderError::Config(format!(
                    "group `{name}` has the same name as defaultGroup"
                )));
            }
            if !seen.insert(name.clone()) {
                return Err(RecorderError::Config(format!("duplicate group `{name}`")));
            }
            let bindings = parse_subnets(&format!("groups.{name}"), &subnets)?;
            groups.push(DeviceGroup::new(name, bindings));
        }

        Ok(Self {
            capture: CaptureOptions {
                device: raw.capture.device,
                commit_interval: Duration::from_secs(raw.capture.interval),
                networks,
            },
            database: DatabaseOptions {
                path: raw
                    .database
                    .path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
                retention_days: raw.database.retention_days,
            },
            default_group: raw.default_group,
            groups,
        })
    }

    pub fn classifier(&self) -> GroupClassifier {
        GroupClassifier::new(self.groups.clone(), self.default_group.clone())
    }
}

fn parse_subnets(field: &str, subnets: &[String]) -> Result<Vec<NetworkBinding>, RecorderError> {
    subnets
        .iter()
        .map(|s| {
            s.parse::<NetworkBinding>()
                .map_err(|e| RecorderError::Config(format!("{field}: {e}")))
        })
        .collect()
}

/// Deserialize a JSON object into `(key, value)` pairs in document order.
/// Group precedence depends on that order, so a sorted map will not do.
fn ordered_groups<'de, D>(deserializer: D) -> Result<Vec<(String, Vec<String>)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct GroupsVisitor;

    impl<'de> Visitor<'de> for GroupsVisitor {
        type Value = Vec<(String, Vec<String>)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of group name to a list of subnets")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut groups = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, Vec<String>>()? {
                groups.push(entry);
            }
            Ok(groups)
        }
    }

    deserializer.deserialize_map(GroupsVisitor)
}
