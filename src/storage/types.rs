use std::path::PathBuf;
use thiserror::Error;

use crate::record::ProgramRecord;
use crate::util::parse_iso_datetime;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database
    #[error("The catalog database is locked by another process. Please try again later.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored row could not be decoded
    #[error("Corrupt {table} row '{key}': {reason}")]
    Corrupt {
        table: &'static str,
        key: String,
        reason: String,
    },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for catalog queries (used by sqlx FromRow).
/// Converts to ProgramRecord via into_record().
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProgramRow {
    pub name: String,
    pub episode_name: String,
    pub station_id: String,
    pub platform_id: String,
    pub episode_id: String,
    pub datetime: String,
    pub duration: Option<i64>,
    pub description: Option<String>,
    pub information: Option<String>,
    pub performers: String,
    pub guests: String,
    pub filename: String,
    pub is_video: bool,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub copyright: Option<String>,
}

impl ProgramRow {
    pub(crate) fn into_record(self) -> Result<ProgramRecord, DatabaseError> {
        let corrupt = |reason: String| DatabaseError::Corrupt {
            table: "programs",
            key: self.filename.clone(),
            reason,
        };

        let datetime = parse_iso_datetime(&self.datetime)
            .map_err(|e| corrupt(format!("datetime '{}': {e}", self.datetime)))?;
        let performers: Vec<String> = serde_json::from_str(&self.performers)
            .map_err(|e| corrupt(format!("performers: {e}")))?;
        let guests: Vec<String> =
            serde_json::from_str(&self.guests).map_err(|e| corrupt(format!("guests: {e}")))?;

        Ok(ProgramRecord {
            name: self.name,
            episode_name: self.episode_name,
            station_id: self.station_id,
            platform_id: self.platform_id,
            episode_id: self.episode_id,
            datetime,
            duration: self.duration.and_then(|d| u64::try_from(d).ok()),
            description: self.description,
            information: self.information,
            performers,
            guests,
            filename: PathBuf::from(self.filename),
            is_video: self.is_video,
            image_url: self.image_url,
            url: self.url,
            copyright: self.copyright,
        })
    }
}

/// Internal row type for the config registry.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ConfigRow {
    pub id: String,
    pub body: String,
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered feed config as stored, before its body is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConfig {
    pub id: String,
    /// Canonical JSON of the config.
    pub body: String,
}

impl From<ConfigRow> for StoredConfig {
    fn from(row: ConfigRow) -> Self {
        Self {
            id: row.id,
            body: row.body,
        }
    }
}
