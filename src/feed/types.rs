use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard upper bound on concurrently executing feed fetches.
pub const MAX_CONCURRENCY: usize = 20;

/// The normalized, format-agnostic representation of one feed entry.
///
/// Created exclusively by the normalizer from a single feed document and
/// immutable afterwards; the digest aggregator only reads.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalItem {
    /// Entry title. Never empty: a placeholder is substituted when the
    /// source omits it.
    pub title: String,
    /// Entry link, empty string when the source omits it.
    pub link: String,
    /// Publication instant with the source offset discarded (wall-clock
    /// digits kept, not converted). `None` when the source date string
    /// failed to parse; such items are excluded from time-window filtering
    /// but still appear in non-digest listings.
    pub published_at: Option<NaiveDateTime>,
    /// Entry summary, already truncated to the configured length.
    pub summary: String,
    /// Raw full content with HTML entities unescaped, populated only when
    /// requested. Markup is stripped at the presentation boundary, never
    /// here.
    pub full_content: Option<String>,
    pub source_feed_name: String,
    /// Category copied from the feed descriptor; may be empty.
    pub source_category: String,
}

/// Identity and location of one subscribed feed.
///
/// Field names on the wire are camelCase to match the subscription file and
/// OPML attribute conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "xmlUrl")]
    pub xml_url: String,
    #[serde(rename = "htmlUrl", default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Errors from normalizing a feed document.
///
/// Both variants are terminal for that single fetch; no partial item list
/// is ever returned.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The bytes are not well-formed XML (or not UTF-8).
    #[error("malformed XML: {0}")]
    MalformedXml(String),
    /// Well-formed XML, but neither an RSS 2.0 `channel` nor any Atom
    /// `entry` elements were found.
    #[error("unrecognized feed format (neither RSS 2.0 nor Atom)")]
    UnknownFormat,
}

/// Errors from one fetch-and-normalize attempt.
///
/// All variants are feed-local: they degrade that feed's contribution to
/// zero items for the cycle and never escalate out of the pool.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level fault: connection, DNS, TLS, or timeout. Collapsed
    /// into one kind since the caller's recovery is identical for all of
    /// them: skip this feed for this cycle.
    #[error("network error: {0}")]
    Network(String),
    /// Response carried a status other than 200.
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The body fetched fine but could not be normalized.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Contract violations in caller-supplied thresholds.
///
/// Zero limits are caller bugs; they fail fast here instead of being
/// silently clamped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("concurrency limit must be at least 1")]
    ZeroConcurrency,
    #[error("fetch timeout must be nonzero")]
    ZeroTimeout,
    #[error("per-category display limit must be at least 1")]
    ZeroCategoryLimit,
    #[error("summary length limit must be at least 1")]
    ZeroSummaryLimit,
}

/// Tunables for one `fetch_all` cycle, passed explicitly so tests can
/// exercise boundary values without environment coupling.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-feed timeout covering the whole request, body included.
    pub timeout: Duration,
    /// Requested pool width; the effective width is
    /// `min(concurrency, MAX_CONCURRENCY, feed count)`.
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            concurrency: MAX_CONCURRENCY,
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.concurrency == 0 {
            return Err(InvalidConfig::ZeroConcurrency);
        }
        if self.timeout.is_zero() {
            return Err(InvalidConfig::ZeroTimeout);
        }
        Ok(())
    }
}

/// Tunables for normalizing one feed document.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Maximum number of items taken from the document, in document order.
    pub item_limit: usize,
    /// Character count past which summaries are truncated with a `...`
    /// suffix. Two call sites historically used different lengths (500 for
    /// the library default, 300 for the single-feed fetch view), so this
    /// stays caller-supplied rather than a constant.
    pub summary_limit: usize,
    /// When set, `full_content` is populated from `content:encoded` (RSS)
    /// or `content` (Atom).
    pub full_content: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            item_limit: usize::MAX,
            summary_limit: 500,
            full_content: false,
        }
    }
}

impl NormalizeConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.summary_limit == 0 {
            return Err(InvalidConfig::ZeroSummaryLimit);
        }
        Ok(())
    }
}
