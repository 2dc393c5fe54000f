//! Podcast feed assembly: program records in, RSS channel + items out.
//!
//! - [`assembler`] - sort-key resolution, ordering and duplicate removal
//! - [`channel`] - channel metadata, derived from a record or overridden
//! - [`item`] - per-episode items and enclosure URLs
//! - [`writer`] - RSS 2.0 + iTunes namespace serialization
//!
//! # Example
//!
//! ```ignore
//! use podfeeder::podcast::{AssemblyOptions, FeedAssembler, ItemBuilder, write_feed};
//!
//! let assembler = FeedAssembler::new(ItemBuilder::new("http://localhost/", "/data/media")?);
//! if let Some(feed) = assembler.assemble(records, &AssemblyOptions::default())? {
//!     let xml = write_feed(&feed, true)?;
//! }
//! ```

mod assembler;
mod channel;
mod item;
mod writer;

pub use assembler::{
    compare_episode_ids, remove_adjacent_duplicates, sort_records, AssemblyOptions,
    AssemblyReport, Feed, FeedAssembler, SkippedItem, SortKey, EPISODE_ID_ORDERED_STATIONS,
};
pub use channel::{Category, Channel, ChannelOverride, PodcastType};
pub use item::{Enclosure, EpisodeType, Item, ItemBuilder, DEFAULT_UTC_OFFSET_SECS};
pub use writer::{write_feed, write_feed_to_file};

use std::path::PathBuf;
use thiserror::Error;

use crate::media::MediaError;

/// Link used when neither the channel nor an episode has one.
pub const FALLBACK_LINK: &str = "https://radiko.jp/";

/// Errors raised while assembling a feed.
///
/// `InvalidSortKey` and `MissingRequiredField` abort the whole build; the
/// remaining variants are per-item and only cause that episode to be skipped.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("'{0}' is not a supported sort key (use 'datetime' or 'episode_id')")]
    InvalidSortKey(String),

    #[error("Channel override is missing required field '{0}'")]
    MissingRequiredField(&'static str),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Media file not found: {}", .0.display())]
    MissingMedia(PathBuf),

    #[error("Media file {} is outside media root {}", .path.display(), .root.display())]
    MediaOutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}
