//! Recorded program entries as stored in the catalog.
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{read_structured, ConfigError};
use crate::util::serde_iso_datetime;

/// One recorded episode of a radio program.
///
/// Produced by the recorder and read back from the catalog; never mutated
/// by feed assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRecord {
    /// Program (show) name, shared by every episode of the show.
    pub name: String,
    #[serde(default)]
    pub episode_name: String,
    pub station_id: String,
    #[serde(default)]
    pub platform_id: String,
    /// Broadcaster episode identifier. Recorders emit both numbers and strings.
    #[serde(deserialize_with = "string_or_number")]
    pub episode_id: String,
    /// Broadcast start in station-local wall-clock time.
    #[serde(with = "serde_iso_datetime")]
    pub datetime: NaiveDateTime,
    /// Duration in seconds when the recorder knew it.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
    /// Longer free-form program information.
    #[serde(default)]
    pub information: Option<String>,
    #[serde(default)]
    pub performers: Vec<String>,
    #[serde(default)]
    pub guests: Vec<String>,
    /// Local path of the recorded media file.
    pub filename: PathBuf,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
}

impl ProgramRecord {
    /// Read a JSON or YAML list of records, as exported by the recorder.
    pub fn read_all(path: &Path) -> Result<Vec<Self>, ConfigError> {
        let records: Vec<Self> = read_structured(path)?;
        tracing::debug!(path = %path.display(), count = records.len(), "Read program records");
        Ok(records)
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(d)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}
