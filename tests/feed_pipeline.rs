//! End-to-end tests: catalog records in, RSS feed files out.
//!
//! Each test creates its own in-memory SQLite database and temp directories
//! for media and output. Generated XML is parsed back with feed-rs.

use podfeeder::config::Config;
use podfeeder::podcast::{write_feed, AssemblyOptions, FeedAssembler, ItemBuilder};
use podfeeder::query::{DatetimeRange, Query};
use podfeeder::util::parse_iso_datetime;
use podfeeder::{Database, Feeder, ProgramRecord};
use std::path::Path;
use tempfile::TempDir;

struct Fixture {
    media: TempDir,
    rss: TempDir,
    feeder: Feeder,
}

async fn fixture() -> Fixture {
    let media = tempfile::tempdir().unwrap();
    let rss = tempfile::tempdir().unwrap();
    let db = Database::open(":memory:").await.unwrap();
    let assembler =
        FeedAssembler::new(ItemBuilder::new("http://localhost:8080/", media.path()).unwrap());
    let feeder = Feeder::new(db, assembler, rss.path());
    Fixture { media, rss, feeder }
}

fn program(media_root: &Path, station: &str, episode_id: &str, datetime: &str) -> ProgramRecord {
    ProgramRecord {
        name: "Night Talk".into(),
        episode_name: format!("Night Talk #{episode_id}"),
        station_id: station.into(),
        platform_id: "radiko.jp".into(),
        episode_id: episode_id.into(),
        datetime: parse_iso_datetime(datetime).unwrap(),
        duration: Some(3600),
        description: Some(format!("Episode {episode_id}")),
        information: None,
        performers: vec!["Alice".into()],
        guests: vec![],
        filename: media_root.join(station).join(format!("{episode_id}.mp3")),
        is_video: false,
        image_url: None,
        url: None,
        copyright: None,
    }
}

fn write_media(record: &ProgramRecord, size: usize) {
    std::fs::create_dir_all(record.filename.parent().unwrap()).unwrap();
    std::fs::write(&record.filename, vec![0u8; size]).unwrap();
}

fn parse(path: &Path) -> feed_rs::model::Feed {
    let content = std::fs::read(path).unwrap();
    feed_rs::parser::parse(content.as_slice()).unwrap()
}

fn entry_ids(feed: &feed_rs::model::Feed) -> Vec<&str> {
    feed.entries.iter().map(|e| e.id.as_str()).collect()
}

// ============================================================================
// Single feed
// ============================================================================

#[tokio::test]
async fn test_newest_first_end_to_end() {
    let fx = fixture().await;
    let root = fx.media.path();
    let records = vec![
        program(root, "TBS", "1", "2024-01-01T01:00:00"),
        program(root, "TBS", "2", "2024-01-08T01:00:00"),
        program(root, "TBS", "3", "2024-01-15T01:00:00"),
    ];
    for r in &records {
        write_media(r, 512);
    }
    fx.feeder.database().insert_programs(&records).await.unwrap();

    let config = Config::new(Query {
        station_ids: Some(vec!["TBS".into()]),
        ..Default::default()
    });
    let id = fx.feeder.register_config(&config).await.unwrap();
    let path = fx.feeder.update_feed(&config, &id).await.unwrap().unwrap();

    assert_eq!(path, fx.rss.path().join(format!("{id}.xml")));
    let feed = parse(&path);
    assert_eq!(feed.title.as_ref().unwrap().content, "Night Talk");
    assert_eq!(entry_ids(&feed), vec!["3", "2", "1"]);
    assert_eq!(
        feed.entries[0].title.as_ref().unwrap().content,
        "Night Talk #3"
    );

    let xml = std::fs::read_to_string(&path).unwrap();
    assert!(xml.contains(
        r#"<enclosure url="http://localhost:8080/media/TBS/3.mp3" length="512" type="audio/mpeg"/>"#
    ));
}

#[tokio::test]
async fn test_missing_media_still_listed() {
    let fx = fixture().await;
    let mut record = program(fx.media.path(), "TBS", "7", "2024-02-01T01:00:00");
    record.duration = None;
    fx.feeder.database().insert_programs(&[record]).await.unwrap();

    let config = Config::new(Query::default());
    let path = fx.feeder.update_feed(&config, "all").await.unwrap().unwrap();

    let xml = std::fs::read_to_string(&path).unwrap();
    assert!(xml.contains(r#"length="0""#));
    assert!(xml.contains("<itunes:duration>0</itunes:duration>"));
    assert_eq!(parse(&path).entries.len(), 1);
}

#[tokio::test]
async fn test_invalid_sort_key_writes_nothing() {
    let fx = fixture().await;
    let record = program(fx.media.path(), "TBS", "1", "2024-01-01T01:00:00");
    fx.feeder.database().insert_programs(&[record]).await.unwrap();

    let mut config = Config::new(Query::default());
    config.sort_by = Some("foo".into());

    let err = fx.feeder.update_feed(&config, "bad").await.unwrap_err();
    assert!(format!("{err:#}").contains("'foo' is not a supported sort key"));
    assert!(!fx.rss.path().join("bad.xml").exists());
}

#[tokio::test]
async fn test_empty_query_result_writes_nothing() {
    let fx = fixture().await;
    let config = Config::new(Query {
        station_ids: Some(vec!["NOPE".into()]),
        ..Default::default()
    });

    assert_eq!(fx.feeder.update_feed(&config, "none").await.unwrap(), None);
    assert!(!fx.rss.path().join("none.xml").exists());
}

#[tokio::test]
async fn test_episode_id_station_ordering() {
    let fx = fixture().await;
    let root = fx.media.path();
    // Broadcast dates deliberately out of step with episode numbers
    let records = vec![
        program(root, "onsen.ag", "9", "2024-03-01T00:00:00"),
        program(root, "onsen.ag", "10", "2024-01-01T00:00:00"),
        program(root, "onsen.ag", "11", "2024-02-01T00:00:00"),
    ];
    fx.feeder.database().insert_programs(&records).await.unwrap();

    let mut config = Config::new(Query {
        station_ids: Some(vec!["onsen.ag".into()]),
        ..Default::default()
    });
    let path = fx.feeder.update_feed(&config, "onsen").await.unwrap().unwrap();
    assert_eq!(entry_ids(&parse(&path)), vec!["11", "10", "9"]);

    config.from_oldest = true;
    let path = fx.feeder.update_feed(&config, "onsen").await.unwrap().unwrap();
    assert_eq!(entry_ids(&parse(&path)), vec!["9", "10", "11"]);
}

#[tokio::test]
async fn test_query_filters_by_person_and_range() {
    let fx = fixture().await;
    let root = fx.media.path();
    let mut guest_ep = program(root, "QRR", "2", "2024-01-10T01:00:00");
    guest_ep.performers = vec![];
    guest_ep.guests = vec!["Bob".into()];
    let records = vec![
        program(root, "TBS", "1", "2024-01-05T01:00:00"),
        guest_ep,
        program(root, "TBS", "3", "2024-02-01T00:00:00"),
    ];
    fx.feeder.database().insert_programs(&records).await.unwrap();

    let config = Config::new(Query {
        persons: Some(vec!["Alice".into(), "Bob".into()]),
        datetime_range: Some(DatetimeRange::between(
            parse_iso_datetime("2024-01-01").unwrap(),
            parse_iso_datetime("2024-02-01").unwrap(),
        )),
        ..Default::default()
    });
    let path = fx.feeder.update_feed(&config, "people").await.unwrap().unwrap();
    assert_eq!(entry_ids(&parse(&path)), vec!["2", "1"]);
}

#[test]
fn test_written_feed_parses_with_feed_rs() {
    let media = tempfile::tempdir().unwrap();
    let records = vec![
        program(media.path(), "TBS", "1", "2024-01-01T01:00:00"),
        program(media.path(), "TBS", "1", "2024-01-01T01:00:00"),
    ];
    let assembler =
        FeedAssembler::new(ItemBuilder::new("http://localhost/", media.path()).unwrap());

    let feed = assembler
        .assemble(records, &AssemblyOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(feed.report.removed_duplicates, 1);

    let xml = write_feed(&feed, true).unwrap();
    let parsed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
    assert_eq!(parsed.entries.len(), 1);
    assert!(parsed
        .description
        .as_ref()
        .unwrap()
        .content
        .contains("Night Talk"));
}

// ============================================================================
// Per-show build
// ============================================================================

#[tokio::test]
async fn test_build_all_groups_by_show() {
    let fx = fixture().await;
    let root = fx.media.path();
    let mut other = program(root, "QRR", "5", "2024-01-02T01:00:00");
    other.name = "Late/Night".into();
    let records = vec![
        program(root, "TBS", "1", "2024-01-01T01:00:00"),
        program(root, "TBS", "2", "2024-01-08T01:00:00"),
        other,
    ];
    fx.feeder.database().insert_programs(&records).await.unwrap();

    let summary = fx
        .feeder
        .build_all(&AssemblyOptions::default())
        .await
        .unwrap();
    assert!(summary.is_success());
    assert_eq!(summary.written.len(), 2);

    let tbs = fx.rss.path().join("TBS").join("Night Talk.xml");
    assert_eq!(entry_ids(&parse(&tbs)), vec!["2", "1"]);
    assert!(fx.rss.path().join("QRR").join("Late_Night.xml").exists());
}
