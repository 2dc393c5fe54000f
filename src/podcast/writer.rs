//! RSS 2.0 serialization with the iTunes podcast namespace.
//!
//! Text passes through [`strip_xml_invalid_chars`] and is escaped by
//! quick-xml, so record fields containing markup (`<br>` in derived channel
//! descriptions) reach clients as literal text.
use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use std::path::Path;

use super::{Channel, Feed, Item, FALLBACK_LINK};
use crate::util::strip_xml_invalid_chars;

const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";
const GENERATOR: &str = concat!("podfeeder ", env!("CARGO_PKG_VERSION"));

/// Render a feed to an RSS document.
pub fn write_feed(feed: &Feed, pretty: bool) -> Result<String> {
    let mut writer = if pretty {
        Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
    } else {
        Writer::new(Cursor::new(Vec::new()))
    };

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:itunes", ITUNES_NS));
    writer
        .write_event(Event::Start(rss))
        .context("Failed to write rss element")?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .context("Failed to write channel element")?;

    write_channel(&mut writer, &feed.channel).context("Failed to write channel metadata")?;

    for item in &feed.items {
        write_item(&mut writer, item)
            .with_context(|| format!("Failed to write item '{}'", item.guid))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .context("Failed to write channel end")?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .context("Failed to write rss end")?;

    let result = writer.into_inner().into_inner();
    String::from_utf8(result).context("Generated feed contains invalid UTF-8")
}

/// Write a feed to `path` atomically.
///
/// Parent directories are created as needed. Content goes to a temporary
/// file beside the destination, is synced, then renamed over it, so readers
/// never see a partial feed.
pub fn write_feed_to_file(feed: &Feed, path: &Path, pretty: bool) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let content = write_feed(feed, pretty)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create feed directory '{}'", parent.display())
        })?;
    }

    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    file.write_all(content.as_bytes()).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to write feed to '{}'", temp_path.display())
    })?;

    file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to sync '{}' to disk", temp_path.display())
    })?;

    drop(file);

    std::fs::rename(&temp_path, path).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            path.display()
        )
    })?;

    tracing::info!(path = %path.display(), items = feed.items.len(), "Wrote feed");
    Ok(())
}

// ============================================================================
// Element helpers
// ============================================================================

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&strip_xml_invalid_chars(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn opt_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: Option<&str>,
) -> Result<()> {
    match text {
        Some(text) => text_element(writer, name, text),
        None => Ok(()),
    }
}

fn image_element<W: Write>(writer: &mut Writer<W>, href: Option<&str>) -> Result<()> {
    if let Some(href) = href {
        let mut image = BytesStart::new("itunes:image");
        image.push_attribute(("href", href));
        writer.write_event(Event::Empty(image))?;
    }
    Ok(())
}

fn yes_element<W: Write>(writer: &mut Writer<W>, name: &str, flag: bool) -> Result<()> {
    if flag {
        text_element(writer, name, "Yes")?;
    }
    Ok(())
}

fn bool_str(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}

// ============================================================================
// Channel and items
// ============================================================================

fn write_channel<W: Write>(writer: &mut Writer<W>, channel: &Channel) -> Result<()> {
    text_element(writer, "title", &channel.title)?;
    text_element(writer, "link", channel.link.as_deref().unwrap_or(FALLBACK_LINK))?;
    text_element(writer, "description", &channel.description)?;
    text_element(writer, "language", &channel.language)?;
    opt_text_element(writer, "copyright", channel.copyright.as_deref())?;
    text_element(writer, "generator", GENERATOR)?;

    image_element(writer, channel.image.as_deref())?;
    if let Some(category) = &channel.category {
        let mut cat = BytesStart::new("itunes:category");
        cat.push_attribute(("text", category.cat.as_str()));
        match &category.sub {
            Some(sub) => {
                writer.write_event(Event::Start(cat))?;
                let mut sub_cat = BytesStart::new("itunes:category");
                sub_cat.push_attribute(("text", sub.as_str()));
                writer.write_event(Event::Empty(sub_cat))?;
                writer.write_event(Event::End(BytesEnd::new("itunes:category")))?;
            }
            None => {
                writer.write_event(Event::Empty(cat))?;
            }
        }
    }
    text_element(writer, "itunes:explicit", bool_str(channel.explicit))?;
    opt_text_element(writer, "itunes:author", channel.author.as_deref())?;
    opt_text_element(writer, "itunes:title", channel.itunes_title.as_deref())?;
    text_element(writer, "itunes:type", channel.podcast_type.as_str())?;
    opt_text_element(writer, "itunes:new-feed-url", channel.new_feed_url.as_deref())?;
    yes_element(writer, "itunes:block", channel.block)?;
    yes_element(writer, "itunes:complete", channel.complete)?;
    Ok(())
}

fn write_item<W: Write>(writer: &mut Writer<W>, item: &Item) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;

    text_element(writer, "title", &item.title)?;
    text_element(writer, "link", item.link.as_deref().unwrap_or(FALLBACK_LINK))?;
    opt_text_element(writer, "description", item.description.as_deref())?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    writer.write_event(Event::Start(guid))?;
    writer.write_event(Event::Text(BytesText::new(&strip_xml_invalid_chars(&item.guid))))?;
    writer.write_event(Event::End(BytesEnd::new("guid")))?;

    let length = item.enclosure.length.to_string();
    let mut enclosure = BytesStart::new("enclosure");
    enclosure.push_attribute(("url", item.enclosure.url.as_str()));
    enclosure.push_attribute(("length", length.as_str()));
    enclosure.push_attribute(("type", item.enclosure.mime_type.as_str()));
    writer.write_event(Event::Empty(enclosure))?;

    if let Some(pub_date) = &item.pub_date {
        let formatted = pub_date.format("%a, %d %b %Y %H:%M:%S %z").to_string();
        text_element(writer, "pubDate", &formatted)?;
    }
    if let Some(duration) = item.duration {
        text_element(writer, "itunes:duration", &duration.to_string())?;
    }
    image_element(writer, item.image.as_deref())?;
    text_element(writer, "itunes:explicit", bool_str(item.explicit))?;
    opt_text_element(writer, "itunes:title", item.itunes_title.as_deref())?;
    if let Some(episode) = item.episode {
        text_element(writer, "itunes:episode", &episode.to_string())?;
    }
    if let Some(season) = item.season {
        text_element(writer, "itunes:season", &season.to_string())?;
    }
    text_element(writer, "itunes:episodeType", item.episode_type.as_str())?;
    yes_element(writer, "itunes:block", item.block)?;

    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}
