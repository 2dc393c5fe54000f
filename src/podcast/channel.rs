//! Channel-level podcast metadata.
use serde::{Deserialize, Deserializer, Serialize};

use super::FeedError;
use crate::record::ProgramRecord;

/// `<itunes:type>` of a show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodcastType {
    #[default]
    Episodic,
    Serial,
}

impl PodcastType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodcastType::Episodic => "episodic",
            PodcastType::Serial => "serial",
        }
    }
}

/// Apple Podcasts category with an optional subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub cat: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

/// Fully resolved channel, ready to serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub language: String,
    pub category: Option<Category>,
    pub explicit: bool,
    pub author: Option<String>,
    pub link: Option<String>,
    pub itunes_title: Option<String>,
    pub podcast_type: PodcastType,
    pub copyright: Option<String>,
    pub new_feed_url: Option<String>,
    pub block: bool,
    pub complete: bool,
}

impl Channel {
    pub const DEFAULT_LANGUAGE: &'static str = "ja";

    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            image: None,
            language: Self::DEFAULT_LANGUAGE.to_string(),
            category: None,
            explicit: false,
            author: None,
            link: None,
            itunes_title: None,
            podcast_type: PodcastType::default(),
            copyright: None,
            new_feed_url: None,
            block: false,
            complete: false,
        }
    }

    /// Derive channel metadata from a representative episode of the show.
    ///
    /// The description is `"{station_id}<br>{name}"`; the markup is escaped
    /// on output.
    pub fn from_record(record: &ProgramRecord) -> Self {
        Self {
            image: record.image_url.clone(),
            author: Some(record.station_id.clone()),
            link: record.url.clone(),
            copyright: record.copyright.clone(),
            ..Self::new(
                record.name.clone(),
                format!("{}<br>{}", record.station_id, record.name),
            )
        }
    }
}

/// User-supplied channel fields from a feed config.
///
/// `title` and `description` are mandatory once an override is given; every
/// other field replaces the derived value only when set. The `itunes_*`
/// spellings are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "itunes_image", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, alias = "itunes_category", skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, alias = "itunes_explicit", skip_serializing_if = "Option::is_none")]
    pub explicit: Option<bool>,
    #[serde(
        default,
        alias = "itunes_author",
        deserialize_with = "string_or_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itunes_title: Option<String>,
    #[serde(default, alias = "itunes_type", skip_serializing_if = "Option::is_none")]
    pub podcast_type: Option<PodcastType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, alias = "itunes_new_feed_url", skip_serializing_if = "Option::is_none")]
    pub new_feed_url: Option<String>,
    #[serde(default, alias = "itunes_block", skip_serializing_if = "Option::is_none")]
    pub block: Option<bool>,
    #[serde(default, alias = "itunes_complete", skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
}

impl ChannelOverride {
    /// Check the mandatory fields.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.title.is_none() {
            return Err(FeedError::MissingRequiredField("title"));
        }
        if self.description.is_none() {
            return Err(FeedError::MissingRequiredField("description"));
        }
        Ok(())
    }

    /// Lay this override over a derived channel, field by field.
    pub fn merge(&self, derived: Channel) -> Result<Channel, FeedError> {
        self.validate()?;

        let o = self.clone();
        Ok(Channel {
            title: o.title.unwrap_or(derived.title),
            description: o.description.unwrap_or(derived.description),
            image: o.image.or(derived.image),
            language: o.language.unwrap_or(derived.language),
            category: o.category.or(derived.category),
            explicit: o.explicit.unwrap_or(derived.explicit),
            author: o.author.or(derived.author),
            link: o.link.or(derived.link),
            itunes_title: o.itunes_title.or(derived.itunes_title),
            podcast_type: o.podcast_type.unwrap_or(derived.podcast_type),
            copyright: o.copyright.or(derived.copyright),
            new_feed_url: o.new_feed_url.or(derived.new_feed_url),
            block: o.block.unwrap_or(derived.block),
            complete: o.complete.unwrap_or(derived.complete),
        })
    }
}

/// Authors may be written as a single string or a list of names.
fn string_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    Ok(Option::<Raw>::deserialize(d)?.map(|raw| match raw {
        Raw::One(s) => s,
        Raw::Many(names) => names.join(", "),
    }))
}
