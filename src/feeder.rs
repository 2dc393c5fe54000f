//! Ties the catalog, the config registry and feed assembly together.
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::podcast::{write_feed_to_file, AssemblyOptions, FeedAssembler};
use crate::record::ProgramRecord;
use crate::storage::{decode_config, Database};
use crate::util::{display_width, pad_to_width};

/// Outcome counts of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub written: Vec<PathBuf>,
    /// Ids (or show names) whose query matched nothing.
    pub empty: Vec<String>,
    /// Ids skipped because their window closed over a week ago.
    pub stale: Vec<String>,
    /// Ids that failed, with the error.
    pub failed: Vec<(String, String)>,
}

impl UpdateSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Feeder {
    db: Database,
    assembler: FeedAssembler,
    rss_root: PathBuf,
    pretty: bool,
}

impl Feeder {
    pub fn new(db: Database, assembler: FeedAssembler, rss_root: impl Into<PathBuf>) -> Self {
        Self {
            db,
            assembler,
            rss_root: rss_root.into(),
            pretty: true,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn rss_root(&self) -> &Path {
        &self.rss_root
    }

    /// Output path of a registered config's feed.
    pub fn feed_path(&self, config_id: &str) -> PathBuf {
        self.rss_root.join(format!("{}.xml", path_component(config_id)))
    }

    pub async fn register_config(&self, config: &Config) -> Result<String> {
        config
            .validate()
            .context("Refusing to register invalid config")?;
        let (id, _) = self.db.register_config(config).await?;
        Ok(id)
    }

    /// Fetch, assemble and write one config's feed.
    ///
    /// Returns `None` without touching the output when nothing matched.
    pub async fn update_feed(&self, config: &Config, config_id: &str) -> Result<Option<PathBuf>> {
        let filter = config.query.to_filter();
        let programs = self
            .db
            .find_programs(&filter)
            .await
            .context("Failed to fetch programs")?;
        tracing::info!(config_id = %config_id, count = programs.len(), "Fetched programs");

        let path = self.feed_path(config_id);
        self.write_programs(programs, &config.assembly_options(), &path)
            .with_context(|| format!("Failed to update feed {config_id}"))
    }

    /// Rebuild every registered feed.
    ///
    /// Feeds whose query window closed more than a week ago are skipped when
    /// their file already exists, unless `force` is set. A failing config is
    /// logged and counted; it never stops the others.
    pub async fn update_feeds(&self, force: bool) -> Result<UpdateSummary> {
        self.update_feeds_at(force, chrono::Local::now().naive_local())
            .await
    }

    /// [`Feeder::update_feeds`] with an explicit notion of "now".
    pub async fn update_feeds_at(&self, force: bool, now: NaiveDateTime) -> Result<UpdateSummary> {
        let stored = self
            .db
            .list_stored_configs()
            .await
            .context("Failed to list registered configs")?;
        tracing::info!(count = stored.len(), force, "Updating feeds");

        let mut summary = UpdateSummary::default();
        for entry in stored {
            let config = match decode_config(&entry) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(config_id = %entry.id, error = %e, "Skipping unreadable config");
                    summary.failed.push((entry.id, e.to_string()));
                    continue;
                }
            };

            if !force && config.is_stale(now) && self.feed_path(&entry.id).exists() {
                tracing::info!(config_id = %entry.id, "Skipping feed of a completed window");
                summary.stale.push(entry.id);
                continue;
            }

            match self.update_feed(&config, &entry.id).await {
                Ok(Some(path)) => summary.written.push(path),
                Ok(None) => summary.empty.push(entry.id),
                Err(e) => {
                    let message = format!("{e:#}");
                    tracing::error!(config_id = %entry.id, error = %message, "Feed update failed");
                    summary.failed.push((entry.id, message));
                }
            }
        }

        tracing::info!(
            written = summary.written.len(),
            empty = summary.empty.len(),
            stale = summary.stale.len(),
            failed = summary.failed.len(),
            "Feed update finished"
        );
        Ok(summary)
    }

    /// Write one feed per show in the catalog.
    ///
    /// Records are grouped by (program name, station id) and written to
    /// `<rss_root>/<station_id>/<name>.xml`.
    pub async fn build_all(&self, options: &AssemblyOptions) -> Result<UpdateSummary> {
        let programs = self
            .db
            .all_programs()
            .await
            .context("Failed to fetch programs")?;

        let mut shows: BTreeMap<(String, String), Vec<ProgramRecord>> = BTreeMap::new();
        for program in programs {
            shows
                .entry((program.station_id.clone(), program.name.clone()))
                .or_default()
                .push(program);
        }
        tracing::info!(shows = shows.len(), "Building per-show feeds");

        let mut summary = UpdateSummary::default();
        for ((station_id, name), records) in shows {
            let path = self.show_feed_path(&station_id, &name);
            match self.write_programs(records, options, &path) {
                Ok(Some(path)) => summary.written.push(path),
                Ok(None) => summary.empty.push(name),
                Err(e) => {
                    let message = format!("{e:#}");
                    tracing::error!(station_id = %station_id, name = %name, error = %message, "Show feed failed");
                    summary.failed.push((format!("{station_id}/{name}"), message));
                }
            }
        }
        Ok(summary)
    }

    /// Output path of a show's feed. Always a file two levels below `rss_root`.
    pub fn show_feed_path(&self, station_id: &str, name: &str) -> PathBuf {
        self.rss_root
            .join(path_component(station_id))
            .join(format!("{}.xml", path_component(name)))
    }

    fn write_programs(
        &self,
        programs: Vec<ProgramRecord>,
        options: &AssemblyOptions,
        path: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(feed) = self.assembler.assemble(programs, options)? else {
            tracing::info!(path = %path.display(), "No programs found, feed not written");
            return Ok(None);
        };

        write_feed_to_file(&feed, path, self.pretty)?;
        Ok(Some(path.to_path_buf()))
    }
}

/// A single file name component: separators become `_`, and names that
/// would address the current or parent directory are replaced.
fn path_component(s: &str) -> String {
    let cleaned = s.replace(['/', '\\', '\0'], "_");
    match cleaned.as_str() {
        "" | "." | ".." => "_".repeat(cleaned.len().max(1)),
        _ => cleaned,
    }
}

// ============================================================================
// Config Table
// ============================================================================

const CONFIG_TABLE_HEADER: [&str; 7] = [
    "config_id",
    "query.platform_ids",
    "query.station_ids",
    "query.persons",
    "query.words",
    "query.datetime_range",
    "channel.title",
];

/// Render registered configs as an aligned text table.
///
/// Rows are ordered by platform ids, then station ids. Columns are sized by
/// terminal display width so Japanese text lines up.
pub fn render_config_table(configs: &[(String, Config)]) -> String {
    fn list(values: &Option<Vec<String>>) -> String {
        values.as_deref().map(|v| v.join(", ")).unwrap_or_default()
    }

    let mut rows: Vec<[String; 7]> = configs
        .iter()
        .map(|(id, config)| {
            let q = &config.query;
            let range = q
                .datetime_range
                .map(|r| {
                    let start = r.start.format("%Y-%m-%d");
                    match r.end {
                        Some(end) => format!("{} - {}", start, end.format("%Y-%m-%d")),
                        None => format!("{} -", start),
                    }
                })
                .unwrap_or_default();
            let title = config
                .channel
                .as_ref()
                .and_then(|c| c.title.clone())
                .unwrap_or_default();
            [
                id.clone(),
                list(&q.platform_ids),
                list(&q.station_ids),
                list(&q.persons),
                list(&q.words),
                range,
                title,
            ]
        })
        .collect();
    rows.sort_by(|a, b| (&a[1], &a[2]).cmp(&(&b[1], &b[2])));

    let mut widths = CONFIG_TABLE_HEADER.map(display_width);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(display_width(cell));
        }
    }

    fn line<'a>(cells: impl IntoIterator<Item = &'a str>, widths: &[usize]) -> String {
        let padded: Vec<String> = cells
            .into_iter()
            .zip(widths)
            .map(|(cell, &w)| pad_to_width(cell, w))
            .collect();
        padded.join("  ").trim_end().to_string()
    }

    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    let mut out = line(CONFIG_TABLE_HEADER, &widths) + "\n";
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in &rows {
        out.push_str(&line(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }
    out
}
