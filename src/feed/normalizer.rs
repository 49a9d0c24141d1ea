use chrono::{DateTime, NaiveDateTime};
use roxmltree::{Document, Node};

use crate::feed::types::{CanonicalItem, FeedDescriptor, NormalizeConfig, ParseError};
use crate::util::text::truncate_chars;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";

const TITLE_PLACEHOLDER: &str = "No Title";

/// Normalizes a raw feed document into canonical items.
///
/// The schema decision is made exactly once per document from a structural
/// probe: a `channel` child of the document root means RSS 2.0; otherwise
/// one or more Atom-namespace `entry` children mean Atom. Both arms funnel
/// into the same item constructor. Returns at most `cfg.item_limit` items
/// in document order, or a [`ParseError`] with no partial results.
pub fn normalize(
    bytes: &[u8],
    feed: &FeedDescriptor,
    cfg: &NormalizeConfig,
) -> Result<Vec<CanonicalItem>, ParseError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ParseError::MalformedXml(format!("invalid UTF-8: {e}")))?;
    let doc = Document::parse(text).map_err(|e| ParseError::MalformedXml(e.to_string()))?;
    let root = doc.root_element();

    if let Some(channel) = root.children().find(|n| n.has_tag_name("channel")) {
        return Ok(rss_items(channel, feed, cfg));
    }

    let entries: Vec<Node> = root
        .children()
        .filter(|n| n.has_tag_name((ATOM_NS, "entry")))
        .collect();
    if entries.is_empty() {
        return Err(ParseError::UnknownFormat);
    }
    Ok(atom_items(&entries, feed, cfg))
}

fn rss_items(
    channel: Node<'_, '_>,
    feed: &FeedDescriptor,
    cfg: &NormalizeConfig,
) -> Vec<CanonicalItem> {
    channel
        .children()
        .filter(|n| n.has_tag_name("item"))
        .take(cfg.item_limit)
        .map(|item| {
            let full_content = cfg
                .full_content
                .then(|| child_text(item, Some(CONTENT_NS), "encoded"))
                .flatten()
                .map(|s| html_escape::decode_html_entities(s).into_owned());
            build_item(
                feed,
                cfg,
                child_text(item, None, "title"),
                child_text(item, None, "link").unwrap_or_default().to_string(),
                child_text(item, None, "pubDate").and_then(parse_rfc2822),
                child_text(item, None, "description").unwrap_or_default(),
                full_content,
            )
        })
        .collect()
}

fn atom_items(
    entries: &[Node<'_, '_>],
    feed: &FeedDescriptor,
    cfg: &NormalizeConfig,
) -> Vec<CanonicalItem> {
    entries
        .iter()
        .take(cfg.item_limit)
        .map(|&entry| {
            // Atom links live in the href attribute, never the element text.
            let link = entry
                .children()
                .find(|n| n.has_tag_name((ATOM_NS, "link")))
                .and_then(|n| n.attribute("href"))
                .unwrap_or_default()
                .to_string();

            let content = child_text(entry, Some(ATOM_NS), "content");
            let mut summary = child_text(entry, Some(ATOM_NS), "summary").unwrap_or_default();
            if summary.is_empty() && !cfg.full_content {
                summary = content.unwrap_or_default();
            }
            let full_content = cfg
                .full_content
                .then_some(content)
                .flatten()
                .map(|s| html_escape::decode_html_entities(s).into_owned());

            build_item(
                feed,
                cfg,
                child_text(entry, Some(ATOM_NS), "title"),
                link,
                child_text(entry, Some(ATOM_NS), "updated").and_then(parse_iso8601),
                summary,
                full_content,
            )
        })
        .collect()
}

/// Single constructor both schema arms map into.
fn build_item(
    feed: &FeedDescriptor,
    cfg: &NormalizeConfig,
    title: Option<&str>,
    link: String,
    published_at: Option<NaiveDateTime>,
    summary: &str,
    full_content: Option<String>,
) -> CanonicalItem {
    let title = match title {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => TITLE_PLACEHOLDER.to_string(),
    };
    CanonicalItem {
        title,
        link,
        published_at,
        summary: truncate_chars(summary, cfg.summary_limit).into_owned(),
        full_content,
        source_feed_name: feed.name.clone(),
        source_category: feed.category.clone().unwrap_or_default(),
    }
}

fn child_text<'a>(node: Node<'a, '_>, ns: Option<&str>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| match ns {
            Some(ns) => n.has_tag_name((ns, name)),
            None => n.has_tag_name(name),
        })
        .and_then(|n| n.text())
}

/// RFC 2822 `pubDate`. The offset is discarded, not converted, so the
/// wall-clock digits survive as written.
fn parse_rfc2822(s: &str) -> Option<NaiveDateTime> {
    let parsed = DateTime::parse_from_rfc2822(s.trim())
        .map(|dt| dt.naive_local())
        .ok();
    if parsed.is_none() {
        tracing::debug!(date = %s, "unparseable pubDate, item kept without timestamp");
    }
    parsed
}

/// ISO-8601 `updated`, with or without a trailing `Z`/offset. Offsets are
/// discarded the same way as for RSS.
fn parse_iso8601(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    let parsed = DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| s.parse::<NaiveDateTime>().ok());
    if parsed.is_none() {
        tracing::debug!(date = %s, "unparseable updated date, item kept without timestamp");
    }
    parsed
}
