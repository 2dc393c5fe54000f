use anyhow::{Context, Result};
use sqlx::{QueryBuilder, Sqlite};

use super::schema::Database;
use super::types::ProgramRow;
use crate::filter::Filter;
use crate::record::ProgramRecord;
use crate::util::format_iso_datetime;

const PROGRAM_COLUMNS: &str = "name, episode_name, station_id, platform_id, episode_id, datetime, \
     duration, description, information, performers, guests, filename, is_video, image_url, url, \
     copyright";

impl Database {
    // ========================================================================
    // Program Catalog
    // ========================================================================

    /// Insert or update catalog records, keyed by media file path.
    ///
    /// Returns the number of records written.
    pub async fn insert_programs(&self, records: &[ProgramRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        // 16 columns per row keeps a chunk well under SQLite's bind limit
        const BATCH_SIZE: usize = 100;
        let mut tx = self.pool.begin().await?;

        for chunk in records.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT INTO programs ({PROGRAM_COLUMNS}) "));

            let mut encode_error = None;
            builder.push_values(chunk, |mut b, record| {
                let performers = serde_json::to_string(&record.performers);
                let guests = serde_json::to_string(&record.guests);
                let (performers, guests) = match (performers, guests) {
                    (Ok(p), Ok(g)) => (p, g),
                    (Err(e), _) | (_, Err(e)) => {
                        encode_error.get_or_insert(e);
                        ("[]".to_string(), "[]".to_string())
                    }
                };

                b.push_bind(&record.name)
                    .push_bind(&record.episode_name)
                    .push_bind(&record.station_id)
                    .push_bind(&record.platform_id)
                    .push_bind(&record.episode_id)
                    .push_bind(format_iso_datetime(&record.datetime))
                    .push_bind(record.duration.and_then(|d| i64::try_from(d).ok()))
                    .push_bind(&record.description)
                    .push_bind(&record.information)
                    .push_bind(performers)
                    .push_bind(guests)
                    .push_bind(record.filename.to_string_lossy().into_owned())
                    .push_bind(record.is_video)
                    .push_bind(&record.image_url)
                    .push_bind(&record.url)
                    .push_bind(&record.copyright);
            });
            if let Some(e) = encode_error {
                return Err(e).context("Failed to encode performers/guests");
            }

            builder.push(
                " ON CONFLICT(filename) DO UPDATE SET \
                 name = excluded.name, episode_name = excluded.episode_name, \
                 station_id = excluded.station_id, platform_id = excluded.platform_id, \
                 episode_id = excluded.episode_id, datetime = excluded.datetime, \
                 duration = excluded.duration, description = excluded.description, \
                 information = excluded.information, performers = excluded.performers, \
                 guests = excluded.guests, is_video = excluded.is_video, \
                 image_url = excluded.image_url, url = excluded.url, \
                 copyright = excluded.copyright",
            );

            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        tracing::debug!(count = records.len(), "Upserted program records");
        Ok(records.len())
    }

    /// Records matching a filter, in catalog (insertion) order.
    pub async fn find_programs(&self, filter: &Filter) -> Result<Vec<ProgramRecord>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PROGRAM_COLUMNS} FROM programs WHERE "));
        filter.push_sql(&mut builder);
        builder.push(" ORDER BY id");

        let rows: Vec<ProgramRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        let records = rows
            .into_iter()
            .map(ProgramRow::into_record)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count = records.len(), "Fetched matching programs");
        Ok(records)
    }

    /// Every catalog record, in catalog order.
    pub async fn all_programs(&self) -> Result<Vec<ProgramRecord>> {
        self.find_programs(&Filter::All).await
    }

    pub async fn count_programs(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM programs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
