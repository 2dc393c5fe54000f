//! Turns a list of catalog records into one ordered feed.
use std::cmp::Ordering;
use std::path::PathBuf;
use std::str::FromStr;

use super::{Channel, ChannelOverride, FeedError, Item, ItemBuilder};
use crate::record::ProgramRecord;

/// Stations whose episode ids increase with every broadcast.
pub const EPISODE_ID_ORDERED_STATIONS: [&str; 2] = ["onsen.ag", "hibiki-radio.jp"];

/// Record field the feed is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Datetime,
    EpisodeId,
}

impl FromStr for SortKey {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "datetime" => Ok(SortKey::Datetime),
            "episode_id" => Ok(SortKey::EpisodeId),
            other => Err(FeedError::InvalidSortKey(other.to_string())),
        }
    }
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Datetime => "datetime",
            SortKey::EpisodeId => "episode_id",
        }
    }

    /// Pick the sort key for a build.
    ///
    /// An explicit key always wins. Otherwise mixed-station feeds sort by
    /// datetime, and single-station feeds from a station with sequential
    /// episode numbering sort by episode id.
    pub fn resolve(explicit: Option<&str>, records: &[ProgramRecord]) -> Result<Self, FeedError> {
        if let Some(key) = explicit {
            return key.parse();
        }

        let Some(first) = records.first() else {
            return Ok(SortKey::Datetime);
        };
        if records.iter().any(|r| r.station_id != first.station_id) {
            return Ok(SortKey::Datetime);
        }
        if EPISODE_ID_ORDERED_STATIONS.contains(&first.station_id.as_str()) {
            Ok(SortKey::EpisodeId)
        } else {
            Ok(SortKey::Datetime)
        }
    }

    fn compare(&self, a: &ProgramRecord, b: &ProgramRecord) -> Ordering {
        match self {
            SortKey::Datetime => a.datetime.cmp(&b.datetime),
            SortKey::EpisodeId => compare_episode_ids(&a.episode_id, &b.episode_id),
        }
    }
}

/// Sort position of an episode id. Numeric ids order before textual ones.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum EpisodeKey<'a> {
    Numeric(u64),
    Text(&'a str),
}

impl<'a> EpisodeKey<'a> {
    fn of(id: &'a str) -> Self {
        match id.parse::<u64>() {
            Ok(n) => EpisodeKey::Numeric(n),
            Err(_) => EpisodeKey::Text(id),
        }
    }
}

/// Total order over episode ids: unsigned integers by value, then every
/// other id lexicographically.
pub fn compare_episode_ids(a: &str, b: &str) -> Ordering {
    EpisodeKey::of(a).cmp(&EpisodeKey::of(b))
}

/// Stable sort, newest first unless `from_oldest`.
pub fn sort_records(records: &mut [ProgramRecord], key: SortKey, from_oldest: bool) {
    if from_oldest {
        records.sort_by(|a, b| key.compare(a, b));
    } else {
        records.sort_by(|a, b| key.compare(b, a));
    }
}

/// Drop records whose datetime and episode id both equal the previous one's.
///
/// Only neighbours are compared, so run this on sorted input.
pub fn remove_adjacent_duplicates(records: Vec<ProgramRecord>) -> Vec<ProgramRecord> {
    let mut kept: Vec<ProgramRecord> = Vec::with_capacity(records.len());
    for record in records {
        if let Some(prev) = kept.last() {
            if prev.datetime == record.datetime && prev.episode_id == record.episode_id {
                tracing::debug!(
                    episode_id = %record.episode_id,
                    path = %record.filename.display(),
                    "Dropping duplicate episode"
                );
                continue;
            }
        }
        kept.push(record);
    }
    kept
}

/// Per-build options, usually taken from a feed config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOptions {
    pub channel: Option<ChannelOverride>,
    /// `datetime` or `episode_id`; resolved from the records when unset.
    pub sort_by: Option<String>,
    pub from_oldest: bool,
    pub remove_duplicates: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            channel: None,
            sort_by: None,
            from_oldest: false,
            remove_duplicates: true,
        }
    }
}

/// An episode left out of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub episode_id: String,
    pub filename: PathBuf,
    pub reason: String,
}

/// What happened during one build, beyond the feed itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub sort_key: SortKey,
    pub removed_duplicates: usize,
    pub skipped: Vec<SkippedItem>,
}

/// An assembled feed: channel plus items in publication order.
#[derive(Debug, Clone)]
pub struct Feed {
    pub channel: Channel,
    pub items: Vec<Item>,
    pub report: AssemblyReport,
}

/// Stateless between builds; each call owns its own sorted record list.
#[derive(Debug, Clone)]
pub struct FeedAssembler {
    items: ItemBuilder,
}

impl FeedAssembler {
    pub fn new(items: ItemBuilder) -> Self {
        Self { items }
    }

    /// Assemble a feed from catalog records.
    ///
    /// Returns `Ok(None)` when there are no records. Items that fail to build
    /// are logged and listed in the report; they never fail the feed.
    ///
    /// # Errors
    ///
    /// - [`FeedError::InvalidSortKey`] for an unknown `sort_by`
    /// - [`FeedError::MissingRequiredField`] for an incomplete channel override
    pub fn assemble(
        &self,
        mut records: Vec<ProgramRecord>,
        options: &AssemblyOptions,
    ) -> Result<Option<Feed>, FeedError> {
        if records.is_empty() {
            tracing::info!("No programs matched, nothing to assemble");
            return Ok(None);
        }

        let sort_key = SortKey::resolve(options.sort_by.as_deref(), &records)?;
        if let Some(channel) = &options.channel {
            channel.validate()?;
        }

        sort_records(&mut records, sort_key, options.from_oldest);

        let mut report = AssemblyReport {
            sort_key,
            ..Default::default()
        };

        if options.remove_duplicates {
            let before = records.len();
            records = remove_adjacent_duplicates(records);
            report.removed_duplicates = before - records.len();
            if report.removed_duplicates > 0 {
                tracing::info!(removed = report.removed_duplicates, "Removed duplicate episodes");
            }
        }

        // First record with the latest datetime, in sorted order
        let Some(newest) = records.iter().min_by(|a, b| b.datetime.cmp(&a.datetime)) else {
            return Ok(None);
        };
        let derived = Channel::from_record(newest);
        let channel = match &options.channel {
            Some(o) => o.merge(derived)?,
            None => derived,
        };

        let mut items = Vec::with_capacity(records.len());
        for record in &records {
            match self.items.build(record) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::error!(
                        episode_id = %record.episode_id,
                        path = %record.filename.display(),
                        error = %e,
                        "Skipping episode"
                    );
                    report.skipped.push(SkippedItem {
                        episode_id: record.episode_id.clone(),
                        filename: record.filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            title = %channel.title,
            items = items.len(),
            sort_key = sort_key.as_str(),
            "Assembled feed"
        );

        Ok(Some(Feed {
            channel,
            items,
            report,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::parse_iso_datetime;
    use pretty_assertions::assert_eq;

    fn rec(station: &str, episode_id: &str, datetime: &str) -> ProgramRecord {
        ProgramRecord {
            name: "Show".into(),
            episode_name: format!("Episode {episode_id}"),
            station_id: station.into(),
            platform_id: String::new(),
            episode_id: episode_id.into(),
            datetime: parse_iso_datetime(datetime).unwrap(),
            duration: Some(600),
            description: None,
            information: None,
            performers: vec![],
            guests: vec![],
            filename: format!("/nonexistent/media/{station}/{episode_id}.mp3").into(),
            is_video: false,
            image_url: None,
            url: None,
            copyright: None,
        }
    }

    fn assembler() -> FeedAssembler {
        FeedAssembler::new(ItemBuilder::new("http://localhost/", "/nonexistent/media").unwrap())
    }

    fn ids(records: &[ProgramRecord]) -> Vec<&str> {
        records.iter().map(|r| r.episode_id.as_str()).collect()
    }

    #[test]
    fn test_sort_key_explicit() {
        let records = vec![rec("onsen.ag", "1", "2024-01-01")];
        assert_eq!(
            SortKey::resolve(Some("datetime"), &records).unwrap(),
            SortKey::Datetime
        );
        assert!(matches!(
            SortKey::resolve(Some("foo"), &records),
            Err(FeedError::InvalidSortKey(k)) if k == "foo"
        ));
    }

    #[test]
    fn test_sort_key_inferred() {
        let onsen = vec![rec("onsen.ag", "1", "2024-01-01"), rec("onsen.ag", "2", "2024-01-08")];
        assert_eq!(SortKey::resolve(None, &onsen).unwrap(), SortKey::EpisodeId);

        let hibiki = vec![rec("hibiki-radio.jp", "1", "2024-01-01")];
        assert_eq!(SortKey::resolve(None, &hibiki).unwrap(), SortKey::EpisodeId);

        let mixed = vec![rec("onsen.ag", "1", "2024-01-01"), rec("TBS", "2", "2024-01-08")];
        assert_eq!(SortKey::resolve(None, &mixed).unwrap(), SortKey::Datetime);

        let radiko = vec![rec("TBS", "1", "2024-01-01")];
        assert_eq!(SortKey::resolve(None, &radiko).unwrap(), SortKey::Datetime);
    }

    #[test]
    fn test_episode_ids_compare_numerically() {
        assert_eq!(compare_episode_ids("9", "10"), Ordering::Less);
        assert_eq!(compare_episode_ids("010", "10"), Ordering::Equal);
        assert_eq!(compare_episode_ids("ep9", "ep10"), Ordering::Greater);
    }

    #[test]
    fn test_mixed_episode_ids_are_totally_ordered() {
        let ids_in = ["1a", "9", "10", "ep2", "3"];
        for a in ids_in {
            for b in ids_in {
                assert_eq!(compare_episode_ids(a, b), compare_episode_ids(b, a).reverse());
                for c in ids_in {
                    if compare_episode_ids(a, b) == Ordering::Less
                        && compare_episode_ids(b, c) == Ordering::Less
                    {
                        assert_eq!(compare_episode_ids(a, c), Ordering::Less, "{a} < {b} < {c}");
                    }
                }
            }
        }

        let mut records = vec![
            rec("onsen.ag", "1a", "2024-01-01"),
            rec("onsen.ag", "10", "2024-01-02"),
            rec("onsen.ag", "9", "2024-01-03"),
        ];
        sort_records(&mut records, SortKey::EpisodeId, true);
        assert_eq!(ids(&records), vec!["9", "10", "1a"]);
    }

    #[test]
    fn test_episode_id_order_descending_then_ascending() {
        let mut records = vec![
            rec("onsen.ag", "2", "2024-01-08"),
            rec("onsen.ag", "10", "2024-01-01"),
            rec("onsen.ag", "1", "2024-01-15"),
        ];
        sort_records(&mut records, SortKey::EpisodeId, false);
        assert_eq!(ids(&records), vec!["10", "2", "1"]);

        sort_records(&mut records, SortKey::EpisodeId, true);
        assert_eq!(ids(&records), vec!["1", "2", "10"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut records = vec![
            rec("TBS", "a", "2024-01-01"),
            rec("TBS", "b", "2024-01-01"),
            rec("TBS", "c", "2024-01-02"),
        ];
        sort_records(&mut records, SortKey::Datetime, false);
        assert_eq!(ids(&records), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_dedup_is_adjacent_only() {
        let records = vec![
            rec("TBS", "1", "2024-01-01"),
            rec("TBS", "1", "2024-01-01"),
            rec("TBS", "2", "2024-01-08"),
            rec("TBS", "1", "2024-01-01"),
        ];
        assert_eq!(ids(&remove_adjacent_duplicates(records)), vec!["1", "2", "1"]);
    }

    #[test]
    fn test_dedup_needs_both_fields_equal() {
        let records = vec![
            rec("TBS", "1", "2024-01-01"),
            rec("TBS", "2", "2024-01-01"),
            rec("TBS", "2", "2024-01-08"),
        ];
        assert_eq!(remove_adjacent_duplicates(records).len(), 3);
    }

    #[test]
    fn test_assemble_empty_is_none() {
        assert!(assembler()
            .assemble(vec![], &AssemblyOptions::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_assemble_newest_first() {
        let records = vec![
            rec("TBS", "1", "2024-01-01T01:00:00"),
            rec("TBS", "3", "2024-01-15T01:00:00"),
            rec("TBS", "2", "2024-01-08T01:00:00"),
        ];
        let feed = assembler()
            .assemble(records, &AssemblyOptions::default())
            .unwrap()
            .unwrap();

        let guids: Vec<_> = feed.items.iter().map(|i| i.guid.as_str()).collect();
        assert_eq!(guids, vec!["3", "2", "1"]);
        assert_eq!(feed.channel.title, "Show");
        assert_eq!(feed.report.sort_key, SortKey::Datetime);
        assert_eq!(feed.report.removed_duplicates, 0);
    }

    #[test]
    fn test_assemble_reports_removed_duplicates() {
        let records = vec![
            rec("TBS", "1", "2024-01-01"),
            rec("TBS", "1", "2024-01-01"),
        ];
        let feed = assembler()
            .assemble(records.clone(), &AssemblyOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.report.removed_duplicates, 1);

        let keep = AssemblyOptions {
            remove_duplicates: false,
            ..Default::default()
        };
        let feed = assembler().assemble(records, &keep).unwrap().unwrap();
        assert_eq!(feed.items.len(), 2);
    }

    #[test]
    fn test_assemble_skips_failing_items() {
        let mut bad = rec("TBS", "2", "2024-01-08");
        bad.filename = "/nonexistent/media/TBS/2.wav".into();
        let records = vec![rec("TBS", "1", "2024-01-01"), bad];

        let feed = assembler()
            .assemble(records, &AssemblyOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.report.skipped.len(), 1);
        assert_eq!(feed.report.skipped[0].episode_id, "2");
        assert!(feed.report.skipped[0].reason.contains("wav"));
    }

    #[test]
    fn test_assemble_invalid_sort_key_fails() {
        let options = AssemblyOptions {
            sort_by: Some("foo".into()),
            ..Default::default()
        };
        let result = assembler().assemble(vec![rec("TBS", "1", "2024-01-01")], &options);
        assert!(matches!(result, Err(FeedError::InvalidSortKey(_))));
    }

    #[test]
    fn test_channel_from_newest_record() {
        let mut old = rec("TBS", "1", "2024-01-01");
        old.name = "Old Name".into();
        let new = rec("TBS", "2", "2024-02-01");
        let options = AssemblyOptions {
            from_oldest: true,
            ..Default::default()
        };

        let feed = assembler().assemble(vec![new, old], &options).unwrap().unwrap();
        assert_eq!(feed.channel.title, "Show");
        assert_eq!(feed.items[0].guid, "1");
    }

    #[test]
    fn test_channel_override_applied() {
        let options = AssemblyOptions {
            channel: Some(ChannelOverride {
                title: Some("Custom".into()),
                description: Some("Custom feed".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let feed = assembler()
            .assemble(vec![rec("TBS", "1", "2024-01-01")], &options)
            .unwrap()
            .unwrap();
        assert_eq!(feed.channel.title, "Custom");
        assert_eq!(feed.channel.author.as_deref(), Some("TBS"));
    }
}
