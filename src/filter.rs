//! Catalog filter expressions.
//!
//! A [`Filter`] is the intermediate form between a user [`Query`](crate::Query)
//! and whatever evaluates it. Three renderings are provided:
//!
//! - [`Filter::to_document`]: the document-filter form (`{field: {op: value}}`
//!   with `$and` / `$or` combinators) used in logs and by document stores
//! - [`Filter::push_sql`]: a bound `WHERE` predicate for the SQLite catalog
//! - [`Filter::matches`]: direct evaluation against a [`ProgramRecord`]
//!
//! SQL and in-memory evaluation agree: substring tests are case-sensitive
//! and treat the word literally (`instr`, not `LIKE`).
use chrono::NaiveDateTime;
use serde_json::{json, Map, Value};
use sqlx::{QueryBuilder, Sqlite};

use crate::record::ProgramRecord;
use crate::util::format_iso_datetime;

/// Program record fields a filter can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    PlatformId,
    StationId,
    Performers,
    Guests,
    Name,
    Description,
    Information,
    EpisodeName,
}

impl Field {
    /// Document key and SQLite column name (they are the same).
    pub fn key(self) -> &'static str {
        match self {
            Field::PlatformId => "platform_id",
            Field::StationId => "station_id",
            Field::Performers => "performers",
            Field::Guests => "guests",
            Field::Name => "name",
            Field::Description => "description",
            Field::Information => "information",
            Field::EpisodeName => "episode_name",
        }
    }

    /// List-valued fields are stored as JSON arrays.
    fn is_list(self) -> bool {
        matches!(self, Field::Performers | Field::Guests)
    }

    fn list<'a>(self, record: &'a ProgramRecord) -> &'a [String] {
        match self {
            Field::Performers => &record.performers,
            Field::Guests => &record.guests,
            _ => &[],
        }
    }

    fn text<'a>(self, record: &'a ProgramRecord) -> Option<&'a str> {
        match self {
            Field::PlatformId => Some(&record.platform_id),
            Field::StationId => Some(&record.station_id),
            Field::Name => Some(&record.name),
            Field::EpisodeName => Some(&record.episode_name),
            Field::Description => record.description.as_deref(),
            Field::Information => record.information.as_deref(),
            Field::Performers | Field::Guests => None,
        }
    }
}

/// A boolean expression over program records.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every record.
    All,
    /// Field value (or, for list fields, any element) is one of `values`.
    In { field: Field, values: Vec<String> },
    /// Field contains `pattern` as a substring.
    Contains { field: Field, pattern: String },
    /// Broadcast datetime in `[start, end)`, or `>= start` when `end` is `None`.
    Between {
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// Evaluate the filter against one record.
    pub fn matches(&self, record: &ProgramRecord) -> bool {
        match self {
            Filter::All => true,
            Filter::In { field, values } if field.is_list() => field
                .list(record)
                .iter()
                .any(|item| values.contains(item)),
            Filter::In { field, values } => field
                .text(record)
                .is_some_and(|v| values.iter().any(|x| x == v)),
            Filter::Contains { field, pattern } => field
                .text(record)
                .is_some_and(|v| v.contains(pattern.as_str())),
            Filter::Between { start, end } => {
                record.datetime >= *start && end.map_or(true, |end| record.datetime < end)
            }
            Filter::And(clauses) => clauses.iter().all(|c| c.matches(record)),
            Filter::Or(clauses) => clauses.iter().any(|c| c.matches(record)),
        }
    }

    /// Render the document-filter form.
    ///
    /// Match-all renders as `{}`. Datetimes render as ISO strings. Words are
    /// regex-escaped so `$regex` matches them literally, like `instr`.
    pub fn to_document(&self) -> Value {
        match self {
            Filter::All => Value::Object(Map::new()),
            Filter::In { field, values } => json!({ field.key(): { "$in": values } }),
            Filter::Contains { field, pattern } => {
                json!({ field.key(): { "$regex": regex::escape(pattern) } })
            }
            Filter::Between { start, end } => {
                let mut condition = Map::new();
                condition.insert("$gte".into(), json!(format_iso_datetime(start)));
                if let Some(end) = end {
                    condition.insert("$lt".into(), json!(format_iso_datetime(end)));
                }
                json!({ "datetime": condition })
            }
            Filter::And(clauses) => {
                json!({ "$and": clauses.iter().map(Filter::to_document).collect::<Vec<_>>() })
            }
            Filter::Or(clauses) => {
                json!({ "$or": clauses.iter().map(Filter::to_document).collect::<Vec<_>>() })
            }
        }
    }

    /// Append this filter as a SQL predicate over the `programs` table.
    ///
    /// Values are always bound, never interpolated. An empty `Or` renders as
    /// false and an empty `And` as true.
    pub fn push_sql(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Filter::All => {
                builder.push("1");
            }
            Filter::In { values, .. } if values.is_empty() => {
                builder.push("0");
            }
            Filter::In { field, values } if field.is_list() => {
                builder.push("EXISTS (SELECT 1 FROM json_each(programs.");
                builder.push(field.key());
                builder.push(") WHERE json_each.value IN (");
                push_bound_list(builder, values);
                builder.push("))");
            }
            Filter::In { field, values } => {
                builder.push(field.key());
                builder.push(" IN (");
                push_bound_list(builder, values);
                builder.push(")");
            }
            Filter::Contains { field, pattern } => {
                builder.push("instr(");
                builder.push(field.key());
                builder.push(", ");
                builder.push_bind(pattern.clone());
                builder.push(") > 0");
            }
            Filter::Between { start, end } => {
                builder.push("(datetime >= ");
                builder.push_bind(format_iso_datetime(start));
                if let Some(end) = end {
                    builder.push(" AND datetime < ");
                    builder.push_bind(format_iso_datetime(end));
                }
                builder.push(")");
            }
            Filter::And(clauses) => push_joined(builder, clauses, " AND ", "1"),
            Filter::Or(clauses) => push_joined(builder, clauses, " OR ", "0"),
        }
    }
}

fn push_bound_list(builder: &mut QueryBuilder<'_, Sqlite>, values: &[String]) {
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
}

fn push_joined(
    builder: &mut QueryBuilder<'_, Sqlite>,
    clauses: &[Filter],
    separator: &str,
    identity: &str,
) {
    if clauses.is_empty() {
        builder.push(identity);
        return;
    }
    builder.push("(");
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            builder.push(separator);
        }
        clause.push_sql(builder);
    }
    builder.push(")");
}
