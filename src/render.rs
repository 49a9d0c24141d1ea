//! Plain-text rendering for the CLI views.
//!
//! Pure string builders so tests can assert on output without capturing
//! stdout. Markup stripping for full content happens here and only here;
//! canonical items keep their content as fetched.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::feed::{CanonicalItem, DigestGroup, FeedDescriptor, UNCATEGORIZED};
use crate::util::text::{strip_markup, truncate_chars, truncate_to_width};

const TITLE_WIDTH: usize = 50;
const URL_CHARS: usize = 50;
const CONTENT_CHARS: usize = 2000;

/// Subscription list, grouped by category.
pub fn render_list(feeds: &[FeedDescriptor], verbose: bool) -> String {
    if feeds.is_empty() {
        return "No subscriptions found\n".to_string();
    }

    let mut by_category: BTreeMap<&str, Vec<&FeedDescriptor>> = BTreeMap::new();
    for feed in feeds {
        let category = feed
            .category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(UNCATEGORIZED);
        by_category.entry(category).or_default().push(feed);
    }

    let mut out = String::new();
    let _ = writeln!(out, "{} subscriptions", feeds.len());
    for (category, group) in by_category {
        let _ = writeln!(out);
        let _ = writeln!(out, "[{}] ({})", category, group.len());
        let _ = writeln!(out, "{}", "-".repeat(40));
        for feed in group {
            let _ = writeln!(out, "  - {}", feed.name);
            if verbose {
                let _ = writeln!(out, "    URL: {}", truncate_chars(&feed.xml_url, URL_CHARS));
            }
        }
    }
    out
}

/// Single-feed fetch view: numbered items with either a summary or
/// stripped full content.
pub fn render_fetch(items: &[CanonicalItem], full_content: bool, verbose: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Latest {} items:", items.len());
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}", "=".repeat(50));
        let _ = writeln!(out, "{}. {}", i + 1, item.title);
        if let Some(ts) = item.published_at {
            let _ = writeln!(out, "   Date: {}", ts.format("%Y-%m-%d %H:%M"));
        }
        if verbose && !item.link.is_empty() {
            let _ = writeln!(out, "   Link: {}", item.link);
        }

        if full_content {
            match &item.full_content {
                Some(content) => {
                    let text = strip_markup(content);
                    let _ = writeln!(
                        out,
                        "\nContent:\n{}",
                        truncate_chars(text.trim(), CONTENT_CHARS)
                    );
                }
                None => {
                    let _ = writeln!(out, "\nFull content not available");
                }
            }
        } else {
            let _ = writeln!(out, "\nSummary: {}", item.summary);
        }
        let _ = writeln!(out);
    }
    out
}

/// Time-windowed digest view.
///
/// `checked` and `failed` come from the fetch outcomes, letting the view
/// distinguish "nothing new" from "every feed failed", which the digest
/// groups alone cannot.
pub fn render_digest(
    groups: &[DigestGroup],
    since: NaiveDateTime,
    now: NaiveDateTime,
    checked: usize,
    failed: usize,
    verbose: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Updates: {} -> {}",
        since.format("%Y-%m-%d %H:%M"),
        now.format("%Y-%m-%d %H:%M")
    );

    let total: usize = groups.iter().map(|g| g.total).sum();
    if total == 0 {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "No new content in this period (checked {checked} feeds{})",
            failed_suffix(failed)
        );
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{total} new items from {checked} feeds{}",
        failed_suffix(failed)
    );
    let _ = writeln!(out, "{}", "=".repeat(60));

    for group in groups {
        let _ = writeln!(out);
        let _ = writeln!(out, "[{}] ({})", group.category, group.total);
        let _ = writeln!(out, "{}", "-".repeat(40));
        for item in &group.items {
            let stamp = item
                .published_at
                .map(|ts| ts.format("%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  - [{stamp}] {}",
                truncate_to_width(&item.title, TITLE_WIDTH)
            );
            let _ = writeln!(out, "    source: {}", item.source_feed_name);
            if verbose && !item.link.is_empty() {
                let _ = writeln!(out, "    link: {}", item.link);
            }
        }
        let hidden = group.total.saturating_sub(group.items.len());
        if hidden > 0 {
            let _ = writeln!(out, "    ... {hidden} more");
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "Updated: {}", now.format("%Y-%m-%d %H:%M"));
    out
}

fn failed_suffix(failed: usize) -> String {
    if failed > 0 {
        format!(", {failed} failed")
    } else {
        String::new()
    }
}
