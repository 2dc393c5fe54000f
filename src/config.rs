//! Feed configs: a query plus how its results are published.
//!
//! Configs are written by users as JSON or YAML and persisted in the config
//! registry under an id derived from their content.
use chrono::{Duration, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

use crate::podcast::{AssemblyOptions, ChannelOverride, FeedError};
use crate::query::Query;

/// Feeds whose query window closed longer ago than this are left alone.
pub const STALE_AFTER_DAYS: i64 = 7;

/// Hex characters kept from the SHA-256 digest for a config id.
const CONFIG_ID_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported config format: '{0}' (use .json, .yaml or .yml)")]
    UnsupportedConfigFormat(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] FeedError),
}

/// One feed definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub query: Query,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelOverride>,
    /// Kept as written so an unknown key fails the build, not the load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub from_oldest: bool,
    #[serde(default = "default_remove_duplicates")]
    pub remove_duplicates: bool,
}

fn default_remove_duplicates() -> bool {
    true
}

/// Read a `.json`, `.yaml` or `.yml` file into `T`.
pub fn read_structured<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match ext {
        "json" => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(&std::fs::read_to_string(path)?)?),
        other => Err(ConfigError::UnsupportedConfigFormat(other.to_string())),
    }
}

impl Config {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            channel: None,
            sort_by: None,
            from_oldest: false,
            remove_duplicates: true,
        }
    }

    /// Load a config file, picking the parser from its extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Config = read_structured(path)?;
        config.validate()?;
        let id = config.id()?;
        tracing::debug!(path = %path.display(), config_id = %id, "Loaded feed config");
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// A channel override, when given, must carry a title and description.
    pub fn validate(&self) -> Result<(), FeedError> {
        match &self.channel {
            Some(channel) => channel.validate(),
            None => Ok(()),
        }
    }

    /// Content-derived registry key.
    ///
    /// Depends only on `query` and `channel`, so re-registering the same feed
    /// with different ordering options updates it in place.
    pub fn id(&self) -> Result<String, ConfigError> {
        #[derive(Serialize)]
        struct Identity<'a> {
            query: &'a Query,
            channel: &'a Option<ChannelOverride>,
        }

        let canonical = serde_json::to_vec(&Identity {
            query: &self.query,
            channel: &self.channel,
        })?;
        let digest = Sha256::digest(&canonical);

        let mut id: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        id.truncate(CONFIG_ID_LEN);
        Ok(id)
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            channel: self.channel.clone(),
            sort_by: self.sort_by.clone(),
            from_oldest: self.from_oldest,
            remove_duplicates: self.remove_duplicates,
        }
    }

    /// True when the query's upper bound lies more than a week before `now`.
    ///
    /// Open-ended queries are never stale.
    pub fn is_stale(&self, now: NaiveDateTime) -> bool {
        self.query
            .datetime_range
            .and_then(|range| range.end)
            .is_some_and(|end| end + Duration::days(STALE_AFTER_DAYS) < now)
    }
}
