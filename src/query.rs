//! Declarative selection of recorded programs.
//!
//! A [`Query`] is what users write in a feed config. It is translated into a
//! [`Filter`] expression by [`Query::to_filter`]; every populated field adds
//! one AND clause and an empty query matches the whole catalog.
use chrono::NaiveDateTime;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::filter::{Field, Filter};
use crate::util::{format_iso_datetime, parse_iso_datetime};

/// Fields searched by free-text words, in clause order.
const WORD_FIELDS: [Field; 4] = [
    Field::Name,
    Field::Description,
    Field::Information,
    Field::EpisodeName,
];

/// Selection criteria for one feed.
///
/// All fields are optional. Lists are OR-ed internally; fields are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Platform ids, e.g. `radiko.jp`, `onsen.ag`, `hibiki-radio.jp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_ids: Option<Vec<String>>,
    /// Station ids, e.g. `TBS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_ids: Option<Vec<String>>,
    /// Personalities or guests; a record matches if any of them appears.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persons: Option<Vec<String>>,
    /// Words searched in program name, description, information and episode name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_range: Option<DatetimeRange>,
}

impl Query {
    /// True when no field would contribute a clause.
    pub fn is_empty(&self) -> bool {
        non_empty(&self.platform_ids).is_none()
            && non_empty(&self.station_ids).is_none()
            && non_empty(&self.persons).is_none()
            && non_empty(&self.words).is_none()
            && self.datetime_range.is_none()
    }

    /// Translate the query into a catalog filter expression.
    pub fn to_filter(&self) -> Filter {
        let mut clauses = Vec::new();

        if let Some(ids) = non_empty(&self.platform_ids) {
            clauses.push(Filter::In {
                field: Field::PlatformId,
                values: ids.to_vec(),
            });
        }
        if let Some(ids) = non_empty(&self.station_ids) {
            clauses.push(Filter::In {
                field: Field::StationId,
                values: ids.to_vec(),
            });
        }
        if let Some(persons) = non_empty(&self.persons) {
            clauses.push(Filter::Or(
                [Field::Performers, Field::Guests]
                    .into_iter()
                    .map(|field| Filter::In {
                        field,
                        values: persons.to_vec(),
                    })
                    .collect(),
            ));
        }
        if let Some(words) = non_empty(&self.words) {
            clauses.push(Filter::Or(
                WORD_FIELDS
                    .into_iter()
                    .flat_map(|field| {
                        words.iter().map(move |word| Filter::Contains {
                            field,
                            pattern: word.clone(),
                        })
                    })
                    .collect(),
            ));
        }
        if let Some(range) = &self.datetime_range {
            clauses.push(Filter::Between {
                start: range.start,
                end: range.end,
            });
        }

        if clauses.is_empty() {
            Filter::All
        } else {
            Filter::And(clauses)
        }
    }
}

fn non_empty(list: &Option<Vec<String>>) -> Option<&[String]> {
    list.as_deref().filter(|l| !l.is_empty())
}

/// Broadcast datetime window.
///
/// One bound means "on or after `start`"; two bounds are the half-open
/// interval `[start, end)`. Persisted as a list of one or two ISO strings; a
/// bare string is accepted on input as a one-bound range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatetimeRange {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl DatetimeRange {
    pub fn since(start: NaiveDateTime) -> Self {
        Self { start, end: None }
    }

    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn contains(&self, dt: &NaiveDateTime) -> bool {
        *dt >= self.start && self.end.map_or(true, |end| *dt < end)
    }
}

impl Serialize for DatetimeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.end.is_some() { 2 } else { 1 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&format_iso_datetime(&self.start))?;
        if let Some(end) = &self.end {
            seq.serialize_element(&format_iso_datetime(end))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for DatetimeRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RangeVisitor;

        impl<'de> Visitor<'de> for RangeVisitor {
            type Value = DatetimeRange;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an ISO datetime or a list of one or two ISO datetimes")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                parse_iso_datetime(v)
                    .map(DatetimeRange::since)
                    .map_err(|e| E::custom(format!("invalid datetime '{v}': {e}")))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut bounds = Vec::with_capacity(2);
                while let Some(raw) = seq.next_element::<String>()? {
                    let dt = parse_iso_datetime(&raw).map_err(|e| {
                        de::Error::custom(format!("invalid datetime '{raw}': {e}"))
                    })?;
                    bounds.push(dt);
                }
                match bounds.as_slice() {
                    [start] => Ok(DatetimeRange::since(*start)),
                    [start, end] => Ok(DatetimeRange::between(*start, *end)),
                    _ => Err(de::Error::invalid_length(bounds.len(), &self)),
                }
            }
        }

        deserializer.deserialize_any(RangeVisitor)
    }
}
