//! SQLite persistence: the program catalog and the feed config registry.
mod configs;
mod programs;
mod schema;
mod types;

pub(crate) use configs::decode_config;
pub use schema::Database;
pub use types::{DatabaseError, StoredConfig};
