//! OPML subscription import/export.
//!
//! Import walks nested `<outline>` elements: an outline with an `xmlUrl`
//! attribute is a feed, any other outline names the category its children
//! inherit. Export is the inverse: feeds grouped under one category
//! outline per category (flat when everything shares a single category).

use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::path::Path;

use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::feed::{FeedDescriptor, UNCATEGORIZED};
use crate::util::atomic_write;

/// Maximum allowed nesting depth for outline elements. Guards against
/// maliciously deep documents.
const MAX_OUTLINE_DEPTH: usize = 50;

#[derive(Debug, Error)]
pub enum OpmlError {
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("failed to serialize OPML: {0}")]
    Serialize(String),

    #[error("failed to access OPML file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default)]
struct Outline {
    text: Option<String>,
    title: Option<String>,
    xml_url: Option<String>,
    html_url: Option<String>,
}

/// Parses OPML content into feed descriptors.
///
/// Entity declarations are never expanded: quick-xml resolves only the
/// five XML builtins, so XXE payloads surface as parse errors instead of
/// file contents.
pub fn parse_opml(content: &str) -> Result<Vec<FeedDescriptor>, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    // Each frame holds the category context the outline's children inherit.
    let mut stack: Vec<Option<String>> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                if stack.len() >= MAX_OUTLINE_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OUTLINE_DEPTH));
                }
                let outline = read_outline(&e, &reader)?;
                let context = stack.last().cloned().flatten();
                let next = collect_outline(outline, context, &mut feeds);
                stack.push(next);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                let outline = read_outline(&e, &reader)?;
                let context = stack.last().cloned().flatten();
                collect_outline(outline, context, &mut feeds);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(feeds)
}

/// Reads and parses an OPML file from disk.
pub fn import_file(path: &Path) -> Result<Vec<FeedDescriptor>, OpmlError> {
    let content = std::fs::read_to_string(path)?;
    parse_opml(&content)
}

/// Records a parsed outline; returns the category context for its
/// children. A feed outline passes the surrounding context through, a
/// category outline replaces it with its own label.
fn collect_outline(
    outline: Outline,
    context: Option<String>,
    feeds: &mut Vec<FeedDescriptor>,
) -> Option<String> {
    let label = outline.text.or(outline.title);
    match outline.xml_url {
        Some(url) => {
            feeds.push(FeedDescriptor {
                name: label.unwrap_or_else(|| url.clone()),
                xml_url: url,
                html_url: outline.html_url,
                category: context.clone(),
            });
            context
        }
        None => label,
    }
}

fn read_outline(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Outline, OpmlError> {
    let decoder = reader.decoder();
    let mut outline = Outline::default();

    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed OPML attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|e| OpmlError::XmlParse(e.to_string()))?
            .to_string();
        match attr.key.as_ref() {
            b"text" => outline.text = Some(value),
            b"title" => outline.title = Some(value),
            b"xmlUrl" => outline.xml_url = Some(value),
            b"htmlUrl" => outline.html_url = Some(value),
            _ => {}
        }
    }

    Ok(outline)
}

/// Merges imported feeds into an existing subscription list.
///
/// Feeds whose URL is already subscribed are skipped; imported feeds
/// without a category land in the placeholder category. Returns
/// `(added, skipped)` counts.
pub fn merge(existing: &mut Vec<FeedDescriptor>, imported: Vec<FeedDescriptor>) -> (usize, usize) {
    let mut known: HashSet<String> = existing.iter().map(|f| f.xml_url.clone()).collect();
    let mut added = 0;
    let mut skipped = 0;

    for mut feed in imported {
        if known.contains(&feed.xml_url) {
            skipped += 1;
            continue;
        }
        if feed.category.is_none() {
            feed.category = Some(UNCATEGORIZED.to_string());
        }
        known.insert(feed.xml_url.clone());
        existing.push(feed);
        added += 1;
    }

    (added, skipped)
}

/// Serializes subscriptions as an OPML 2.0 document.
///
/// Category outlines are emitted only when more than one category exists;
/// a single-category list stays flat.
pub fn export_opml(feeds: &[FeedDescriptor]) -> Result<String, OpmlError> {
    fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), OpmlError> {
        writer
            .write_event(event)
            .map_err(|e| OpmlError::Serialize(e.to_string()))
    }

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut opml = BytesStart::new("opml");
    opml.push_attribute(("version", "2.0"));
    write(&mut writer, Event::Start(opml))?;

    write(&mut writer, Event::Start(BytesStart::new("head")))?;
    write(&mut writer, Event::Start(BytesStart::new("title")))?;
    write(
        &mut writer,
        Event::Text(BytesText::new("brief subscriptions")),
    )?;
    write(&mut writer, Event::End(BytesEnd::new("title")))?;
    let created = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    write(&mut writer, Event::Start(BytesStart::new("dateCreated")))?;
    write(&mut writer, Event::Text(BytesText::new(&created)))?;
    write(&mut writer, Event::End(BytesEnd::new("dateCreated")))?;
    write(&mut writer, Event::End(BytesEnd::new("head")))?;

    write(&mut writer, Event::Start(BytesStart::new("body")))?;

    let mut by_category: BTreeMap<&str, Vec<&FeedDescriptor>> = BTreeMap::new();
    for feed in feeds {
        let category = feed
            .category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(UNCATEGORIZED);
        by_category.entry(category).or_default().push(feed);
    }
    let nested = by_category.len() > 1;

    for (category, group) in by_category {
        if nested {
            let mut outline = BytesStart::new("outline");
            outline.push_attribute(("text", category));
            outline.push_attribute(("title", category));
            write(&mut writer, Event::Start(outline))?;
        }
        for feed in group {
            let mut outline = BytesStart::new("outline");
            outline.push_attribute(("type", "rss"));
            outline.push_attribute(("text", feed.name.as_str()));
            outline.push_attribute(("title", feed.name.as_str()));
            outline.push_attribute(("xmlUrl", feed.xml_url.as_str()));
            if let Some(ref html_url) = feed.html_url {
                outline.push_attribute(("htmlUrl", html_url.as_str()));
            }
            write(&mut writer, Event::Empty(outline))?;
        }
        if nested {
            write(&mut writer, Event::End(BytesEnd::new("outline")))?;
        }
    }

    write(&mut writer, Event::End(BytesEnd::new("body")))?;
    write(&mut writer, Event::End(BytesEnd::new("opml")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| OpmlError::Serialize(e.to_string()))
}

/// Exports subscriptions to an OPML file atomically.
pub fn export_to_file(feeds: &[FeedDescriptor], path: &Path) -> Result<(), OpmlError> {
    let content = export_opml(feeds)?;
    atomic_write(path, content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_nested_categories() {
        let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>Test Feeds</title></head>
  <body>
    <outline text="Blogs" title="Blogs">
      <outline type="rss" text="Example Blog" xmlUrl="https://example.com/feed.xml" htmlUrl="https://example.com"/>
      <outline type="rss" text="Second" xmlUrl="https://second.com/rss"/>
    </outline>
    <outline type="rss" text="Top Level" xmlUrl="https://top.com/rss"/>
  </body>
</opml>"#;

        let feeds = parse_opml(content).unwrap();
        assert_eq!(feeds.len(), 3);

        assert_eq!(feeds[0].name, "Example Blog");
        assert_eq!(feeds[0].xml_url, "https://example.com/feed.xml");
        assert_eq!(feeds[0].html_url.as_deref(), Some("https://example.com"));
        assert_eq!(feeds[0].category.as_deref(), Some("Blogs"));

        assert_eq!(feeds[1].category.as_deref(), Some("Blogs"));

        assert_eq!(feeds[2].name, "Top Level");
        assert_eq!(feeds[2].category, None);
    }

    #[test]
    fn feed_children_inherit_surrounding_category() {
        // A feed outline with children: those children keep the enclosing
        // category, not the feed's name.
        let content = r#"<opml version="2.0"><body>
  <outline text="News">
    <outline text="Parent Feed" xmlUrl="https://parent.com/rss">
      <outline text="Child Feed" xmlUrl="https://child.com/rss"/>
    </outline>
  </outline>
</body></opml>"#;

        let feeds = parse_opml(content).unwrap();
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].category.as_deref(), Some("News"));
        assert_eq!(feeds[1].category.as_deref(), Some("News"));
    }

    #[test]
    fn name_falls_back_to_title_then_url() {
        let content = r#"<opml version="2.0"><body>
  <outline title="Titled" xmlUrl="https://titled.com/rss"/>
  <outline xmlUrl="https://bare.com/rss"/>
</body></opml>"#;

        let feeds = parse_opml(content).unwrap();
        assert_eq!(feeds[0].name, "Titled");
        assert_eq!(feeds[1].name, "https://bare.com/rss");
    }

    #[test]
    fn empty_body_yields_no_feeds() {
        let feeds = parse_opml(r#"<opml version="2.0"><body></body></opml>"#).unwrap();
        assert!(feeds.is_empty());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_opml("<not valid xml").is_err());
    }

    #[test]
    fn deeply_nested_document_rejected() {
        let mut opml = String::from(r#"<opml version="2.0"><body>"#);
        for _ in 0..100 {
            opml.push_str(r#"<outline text="level">"#);
        }
        for _ in 0..100 {
            opml.push_str("</outline>");
        }
        opml.push_str("</body></opml>");

        assert!(matches!(
            parse_opml(&opml),
            Err(OpmlError::MaxDepthExceeded(_))
        ));
    }

    #[test]
    fn entity_declarations_do_not_expand() {
        let content = r#"<?xml version="1.0"?>
<!DOCTYPE opml [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<opml version="2.0"><body>
  <outline text="&xxe;" xmlUrl="https://example.com/feed.xml"/>
</body></opml>"#;

        match parse_opml(content) {
            Ok(feeds) => {
                for feed in &feeds {
                    assert!(!feed.name.contains("root:"));
                }
            }
            // Rejecting the payload outright is also fine.
            Err(_) => {}
        }
    }

    #[test]
    fn merge_skips_already_subscribed_urls() {
        let mut existing = vec![FeedDescriptor {
            name: "Existing".to_string(),
            xml_url: "https://existing.com/rss".to_string(),
            html_url: None,
            category: Some("Tech".to_string()),
        }];
        let imported = vec![
            FeedDescriptor {
                name: "Existing Again".to_string(),
                xml_url: "https://existing.com/rss".to_string(),
                html_url: None,
                category: None,
            },
            FeedDescriptor {
                name: "Fresh".to_string(),
                xml_url: "https://fresh.com/rss".to_string(),
                html_url: None,
                category: None,
            },
        ];

        let (added, skipped) = merge(&mut existing, imported);
        assert_eq!((added, skipped), (1, 1));
        assert_eq!(existing.len(), 2);
        assert_eq!(existing[1].name, "Fresh");
        assert_eq!(existing[1].category.as_deref(), Some(UNCATEGORIZED));
    }

    #[test]
    fn export_round_trips_categories() {
        let original = vec![
            FeedDescriptor {
                name: "Art Feed".to_string(),
                xml_url: "https://art.com/rss".to_string(),
                html_url: Some("https://art.com".to_string()),
                category: Some("Art".to_string()),
            },
            FeedDescriptor {
                name: "Tech Feed".to_string(),
                xml_url: "https://tech.com/rss".to_string(),
                html_url: None,
                category: Some("Tech".to_string()),
            },
        ];

        let exported = export_opml(&original).unwrap();
        let parsed = parse_opml(&exported).unwrap();

        assert_eq!(parsed, original);
    }

    #[test]
    fn export_single_category_stays_flat() {
        let feeds = vec![FeedDescriptor {
            name: "Only".to_string(),
            xml_url: "https://only.com/rss".to_string(),
            html_url: None,
            category: Some("Tech".to_string()),
        }];

        let exported = export_opml(&feeds).unwrap();
        // No wrapping category outline, so the parsed feed has no category.
        let parsed = parse_opml(&exported).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].category, None);
        assert!(!exported.contains(r#"<outline text="Tech" title="Tech">"#));
    }

    #[test]
    fn export_escapes_special_characters() {
        let feeds = vec![FeedDescriptor {
            name: "Feed with <special> & \"chars\"".to_string(),
            xml_url: "https://example.com/feed?a=1&b=2".to_string(),
            html_url: None,
            category: Some("Tech".to_string()),
        }];

        let exported = export_opml(&feeds).unwrap();
        let parsed = parse_opml(&exported).unwrap();
        assert_eq!(parsed[0].name, "Feed with <special> & \"chars\"");
        assert_eq!(parsed[0].xml_url, "https://example.com/feed?a=1&b=2");
    }

    #[test]
    fn export_to_file_writes_parseable_document() {
        let dir = std::env::temp_dir().join("brief_opml_export_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("export.opml");

        let feeds = vec![FeedDescriptor {
            name: "File Export".to_string(),
            xml_url: "https://example.com/feed.xml".to_string(),
            html_url: None,
            category: Some("Tech".to_string()),
        }];
        export_to_file(&feeds, &path).unwrap();

        let parsed = import_file(&path).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "File Export");

        std::fs::remove_dir_all(&dir).ok();
    }
}
