//! Episode items and their enclosures.
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::{Component, Path, PathBuf};
use url::Url;

use super::FeedError;
use crate::media::MediaMetadata;
use crate::record::ProgramRecord;

/// Broadcast times are Japan Standard Time unless configured otherwise.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// Characters escaped inside one path segment of an enclosure URL.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EpisodeType {
    #[default]
    Full,
    Trailer,
    Bonus,
}

impl EpisodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeType::Full => "full",
            EpisodeType::Trailer => "trailer",
            EpisodeType::Bonus => "bonus",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub length: u64,
    pub mime_type: String,
}

/// One podcast episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub title: String,
    pub enclosure: Enclosure,
    pub guid: String,
    pub pub_date: Option<DateTime<FixedOffset>>,
    pub description: Option<String>,
    /// Seconds.
    pub duration: Option<u64>,
    pub link: Option<String>,
    pub image: Option<String>,
    pub explicit: bool,
    pub itunes_title: Option<String>,
    pub episode: Option<u32>,
    pub season: Option<u32>,
    pub episode_type: EpisodeType,
    pub block: bool,
}

/// Maps program records to feed items.
///
/// Holds everything an item needs beyond the record itself: where media is
/// served from, where it lives on disk, the broadcast time zone and whether
/// a missing media file is tolerated.
#[derive(Debug, Clone)]
pub struct ItemBuilder {
    base_url: Url,
    media_root: PathBuf,
    utc_offset: FixedOffset,
    tolerate_missing_media: bool,
}

impl ItemBuilder {
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidBaseUrl`] if `base_url` is not absolute.
    pub fn new(base_url: &str, media_root: impl Into<PathBuf>) -> Result<Self, FeedError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the base ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            media_root: media_root.into(),
            utc_offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or(Utc.fix()),
            tolerate_missing_media: true,
        })
    }

    pub fn utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn tolerate_missing_media(mut self, tolerate: bool) -> Self {
        self.tolerate_missing_media = tolerate;
        self
    }

    /// Public URL of a media file: its path under `media_root`, percent-encoded
    /// per segment and joined under `media/` of the base URL.
    pub fn enclosure_url(&self, path: &Path) -> Result<String, FeedError> {
        let absolute = absolutize(path)?;
        let root = absolutize(&self.media_root)?;

        let relative = absolute
            .strip_prefix(&root)
            .map_err(|_| FeedError::MediaOutsideRoot {
                path: path.to_path_buf(),
                root: self.media_root.clone(),
            })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(seg) => {
                    let seg = seg.to_string_lossy();
                    segments.push(utf8_percent_encode(&seg, SEGMENT).to_string());
                }
                Component::CurDir => {}
                _ => {
                    return Err(FeedError::MediaOutsideRoot {
                        path: path.to_path_buf(),
                        root: self.media_root.clone(),
                    })
                }
            }
        }

        let url = self
            .base_url
            .join(&format!("media/{}", segments.join("/")))?;
        Ok(url.into())
    }

    /// Build the feed item for one record.
    ///
    /// # Errors
    ///
    /// - [`FeedError::Media`] for unsupported media kinds or unreadable containers
    /// - [`FeedError::MediaOutsideRoot`] if the file is not under `media_root`
    /// - [`FeedError::MissingMedia`] if the file is absent and missing media
    ///   is not tolerated
    pub fn build(&self, record: &ProgramRecord) -> Result<Item, FeedError> {
        let media = MediaMetadata::resolve(&record.filename, record.is_video, record.duration)?;
        if !media.exists && !self.tolerate_missing_media {
            return Err(FeedError::MissingMedia(record.filename.clone()));
        }

        let url = self.enclosure_url(&record.filename)?;

        let title = if record.episode_name.trim().is_empty() {
            record.name.clone()
        } else {
            record.episode_name.clone()
        };

        Ok(Item {
            title,
            enclosure: Enclosure {
                url,
                length: media.length,
                mime_type: media.mime_type.to_string(),
            },
            guid: record.episode_id.clone(),
            pub_date: self.utc_offset.from_local_datetime(&record.datetime).single(),
            description: record.description.clone(),
            duration: Some(media.duration),
            link: record.url.clone(),
            image: record.image_url.clone(),
            explicit: false,
            itunes_title: None,
            episode: None,
            season: None,
            episode_type: EpisodeType::Full,
            block: false,
        })
    }
}

fn absolutize(path: &Path) -> Result<PathBuf, FeedError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(crate::media::MediaError::Io)?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::parse_iso_datetime;
    use pretty_assertions::assert_eq;

    fn record(filename: &str) -> ProgramRecord {
        ProgramRecord {
            name: "Night Talk".into(),
            episode_name: "#12 Spring".into(),
            station_id: "TBS".into(),
            platform_id: "radiko.jp".into(),
            episode_id: "12".into(),
            datetime: parse_iso_datetime("2024-03-01T22:00:00").unwrap(),
            duration: Some(1800),
            description: Some("Talk & music".into()),
            information: None,
            performers: vec![],
            guests: vec![],
            filename: filename.into(),
            is_video: false,
            image_url: None,
            url: Some("https://example.com/night".into()),
            copyright: None,
        }
    }

    #[test]
    fn test_enclosure_url_is_percent_encoded_per_segment() {
        let builder = ItemBuilder::new("http://localhost:8080/", "/data/media").unwrap();
        let url = builder
            .enclosure_url(Path::new("/data/media/TBS/night talk #12.mp3"))
            .unwrap();
        assert_eq!(url, "http://localhost:8080/media/TBS/night%20talk%20%2312.mp3");
    }

    #[test]
    fn test_enclosure_url_non_ascii() {
        let builder = ItemBuilder::new("https://pods.example.com/radio/", "/m").unwrap();
        let url = builder.enclosure_url(Path::new("/m/QRR/深夜.m4a")).unwrap();
        assert_eq!(
            url,
            "https://pods.example.com/radio/media/QRR/%E6%B7%B1%E5%A4%9C.m4a"
        );
    }

    #[test]
    fn test_base_url_without_trailing_slash_keeps_path() {
        let builder = ItemBuilder::new("https://pods.example.com/radio", "/m").unwrap();
        let url = builder.enclosure_url(Path::new("/m/a.mp3")).unwrap();
        assert_eq!(url, "https://pods.example.com/radio/media/a.mp3");
    }

    #[test]
    fn test_path_outside_media_root_rejected() {
        let builder = ItemBuilder::new("http://localhost/", "/data/media").unwrap();
        let err = builder
            .enclosure_url(Path::new("/elsewhere/a.mp3"))
            .unwrap_err();
        assert!(matches!(err, FeedError::MediaOutsideRoot { .. }));

        let err = builder
            .enclosure_url(Path::new("/data/media/../secret/a.mp3"))
            .unwrap_err();
        assert!(matches!(err, FeedError::MediaOutsideRoot { .. }));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ItemBuilder::new("not a url", "/m"),
            Err(FeedError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_build_with_missing_media() {
        let builder = ItemBuilder::new("http://localhost/", "/nonexistent/media").unwrap();
        let mut rec = record("/nonexistent/media/TBS/night-12.mp3");
        rec.duration = None;

        let item = builder.build(&rec).unwrap();
        assert_eq!(item.title, "#12 Spring");
        assert_eq!(item.guid, "12");
        assert_eq!(item.enclosure.length, 0);
        assert_eq!(item.enclosure.mime_type, "audio/mpeg");
        assert_eq!(item.duration, Some(0));
        assert_eq!(
            item.enclosure.url,
            "http://localhost/media/TBS/night-12.mp3"
        );
        assert_eq!(
            item.pub_date.unwrap().to_rfc3339(),
            "2024-03-01T22:00:00+09:00"
        );
    }

    #[test]
    fn test_missing_media_rejected_when_not_tolerated() {
        let builder = ItemBuilder::new("http://localhost/", "/nonexistent/media")
            .unwrap()
            .tolerate_missing_media(false);
        let err = builder
            .build(&record("/nonexistent/media/TBS/night-12.mp3"))
            .unwrap_err();
        assert!(matches!(err, FeedError::MissingMedia(_)));
    }

    #[test]
    fn test_blank_episode_name_falls_back_to_program_name() {
        let builder = ItemBuilder::new("http://localhost/", "/nonexistent/media").unwrap();
        let mut rec = record("/nonexistent/media/a.mp3");
        rec.episode_name = "  ".into();
        assert_eq!(builder.build(&rec).unwrap().title, "Night Talk");
    }

    #[test]
    fn test_existing_media_length_and_offset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("TBS")).unwrap();
        let path = dir.path().join("TBS/night-12.mp3");
        std::fs::write(&path, vec![0u8; 1234]).unwrap();

        let builder = ItemBuilder::new("http://localhost/", dir.path())
            .unwrap()
            .utc_offset(FixedOffset::east_opt(0).unwrap());
        let item = builder.build(&record(path.to_str().unwrap())).unwrap();

        assert_eq!(item.enclosure.length, 1234);
        assert_eq!(item.duration, Some(1800));
        assert_eq!(
            item.pub_date.unwrap().to_rfc3339(),
            "2024-03-01T22:00:00+00:00"
        );
    }

    #[test]
    fn test_unsupported_media_fails_item() {
        let builder = ItemBuilder::new("http://localhost/", "/m").unwrap();
        let err = builder.build(&record("/m/a.wav")).unwrap_err();
        assert!(matches!(err, FeedError::Media(_)));
    }
}
