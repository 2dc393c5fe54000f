use anyhow::{Context, Result};

use super::schema::Database;
use super::types::{ConfigRow, DatabaseError, StoredConfig};
use crate::config::Config;

impl Database {
    // ========================================================================
    // Config Registry
    // ========================================================================

    /// Store a feed config under its content id.
    ///
    /// Re-registering the same query and channel replaces the stored body.
    /// Returns the id and whether it was newly created.
    pub async fn register_config(&self, config: &Config) -> Result<(String, bool)> {
        let id = config.id().context("Failed to derive config id")?;
        let body = serde_json::to_string(config).context("Failed to encode config")?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM configs WHERE id = ?")
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO configs (id, body, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
        "#,
        )
        .bind(&id)
        .bind(&body)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let created = existing.is_none();
        tracing::info!(config_id = %id, created, "Registered feed config");
        Ok((id, created))
    }

    /// Raw registry entries, oldest registration first.
    pub async fn list_stored_configs(&self) -> Result<Vec<StoredConfig>> {
        let rows: Vec<ConfigRow> =
            sqlx::query_as("SELECT id, body FROM configs ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(StoredConfig::from).collect())
    }

    /// Every registered config, decoded.
    ///
    /// # Errors
    ///
    /// Fails with [`DatabaseError::Corrupt`] on the first body that does not
    /// decode; use [`Database::list_stored_configs`] to inspect entries one
    /// by one.
    pub async fn list_configs(&self) -> Result<Vec<(String, Config)>> {
        self.list_stored_configs()
            .await?
            .into_iter()
            .map(|stored| -> Result<(String, Config)> {
                let config = decode_config(&stored)?;
                Ok((stored.id, config))
            })
            .collect()
    }

    pub async fn get_config(&self, id: &str) -> Result<Option<Config>> {
        let row: Option<ConfigRow> =
            sqlx::query_as("SELECT id, body FROM configs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(decode_config(&StoredConfig::from(row))?)),
            None => Ok(None),
        }
    }

    /// Returns true if a config was removed.
    pub async fn remove_config(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM configs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub(crate) fn decode_config(stored: &StoredConfig) -> Result<Config, DatabaseError> {
    serde_json::from_str(&stored.body).map_err(|e| DatabaseError::Corrupt {
        table: "configs",
        key: stored.id.clone(),
        reason: e.to_string(),
    })
}
