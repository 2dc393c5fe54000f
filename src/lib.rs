//! Podcast feeds for archived radio recordings.
//!
//! Recorded programs live in a SQLite catalog ([`storage`]). A feed config
//! ([`config::Config`]) pairs a [`query::Query`] with channel options; the
//! [`feeder::Feeder`] fetches the matching records, the
//! [`podcast::FeedAssembler`] orders them and removes duplicates, and the
//! result is written as RSS 2.0 with the iTunes namespace.

pub mod config;
pub mod feeder;
pub mod filter;
pub mod media;
pub mod podcast;
pub mod query;
pub mod record;
pub mod settings;
pub mod storage;
pub mod util;

pub use config::{Config, ConfigError};
pub use feeder::{render_config_table, Feeder, UpdateSummary};
pub use filter::{Field, Filter};
pub use media::{MediaError, MediaKind, MediaMetadata};
pub use podcast::{AssemblyOptions, Feed, FeedAssembler, FeedError, ItemBuilder};
pub use query::{DatetimeRange, Query};
pub use record::ProgramRecord;
pub use settings::{Settings, SettingsError};
pub use storage::{Database, DatabaseError};
