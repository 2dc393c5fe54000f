//! Utility functions shared by the catalog, the query layer and the feed writer.
//!
//! - **Datetimes**: lenient ISO-8601 parsing and a fixed text form that sorts
//!   chronologically when stored as SQLite `TEXT`
//! - **Text**: removal of characters XML 1.0 cannot carry, and terminal
//!   display width for CLI tables
//!
//! # Examples
//!
//! ```
//! use podfeeder::util::{parse_iso_datetime, strip_xml_invalid_chars};
//!
//! let dt = parse_iso_datetime("2024-04-01").unwrap();
//! assert_eq!(dt.to_string(), "2024-04-01 00:00:00");
//!
//! assert_eq!(strip_xml_invalid_chars("a\u{1}b"), "ab");
//! ```

mod datetime;
mod text;

pub use datetime::{format_iso_datetime, parse_iso_datetime, serde_iso_datetime};
pub use text::{display_width, pad_to_width, strip_xml_invalid_chars};
