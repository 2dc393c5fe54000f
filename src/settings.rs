//! Application settings from `~/.config/podfeeder/config.toml`.
//!
//! The file is optional: a missing or empty file yields `Settings::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::podcast::{FeedAssembler, FeedError, ItemBuilder};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Settings file too large: {0}")]
    TooLarge(String),

    #[error("UTC offset of {0} minutes is out of range")]
    InvalidUtcOffset(i32),

    #[error(transparent)]
    Feed(#[from] FeedError),
}

// ============================================================================
// Settings
// ============================================================================

/// Where media lives, where it is served from, and where feeds are written.
///
/// All fields use `#[serde(default)]` so any subset of keys can be given.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Public URL that `media/` and feed files are served under.
    pub base_url: String,

    /// Directory feed XML files are written to.
    pub rss_root: PathBuf,

    /// Directory recordings are stored under. Enclosure URLs mirror its layout.
    pub media_root: PathBuf,

    /// SQLite database holding the program catalog and feed configs.
    pub database: PathBuf,

    /// Offset of broadcast wall-clock times from UTC, in minutes.
    pub utc_offset_minutes: i32,

    /// Emit items for recordings whose file is missing (zero length/duration).
    pub tolerate_missing_media: bool,

    /// Indent generated XML.
    pub pretty: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/".to_string(),
            rss_root: PathBuf::from("rss"),
            media_root: PathBuf::from("media"),
            database: PathBuf::from("podfeeder.db"),
            utc_offset_minutes: 9 * 60,
            tolerate_missing_media: true,
            pretty: true,
        }
    }
}

impl Settings {
    /// Maximum settings file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "base_url",
        "rss_root",
        "media_root",
        "database",
        "utc_offset_minutes",
        "tolerate_missing_media",
        "pretty",
    ];

    /// Load settings from a TOML file.
    ///
    /// - Missing file → `Ok(Settings::default())`
    /// - Empty file → `Ok(Settings::default())`
    /// - Invalid TOML → `Err(SettingsError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(SettingsError::TooLarge(format!(
                    "Settings file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(SettingsError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Settings file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(SettingsError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Settings file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in settings file, ignoring");
                }
            }
        }

        let settings: Settings = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            base_url = %settings.base_url,
            rss_root = %settings.rss_root.display(),
            "Loaded settings"
        );
        Ok(settings)
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, SettingsError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(SettingsError::InvalidUtcOffset(self.utc_offset_minutes))
    }

    /// Assembler configured from these settings.
    pub fn assembler(&self) -> Result<FeedAssembler, SettingsError> {
        let items = ItemBuilder::new(&self.base_url, self.media_root.clone())?
            .utc_offset(self.utc_offset()?)
            .tolerate_missing_media(self.tolerate_missing_media);
        Ok(FeedAssembler::new(items))
    }
}

// ============================================================================
// Tests
// ============================================================================
