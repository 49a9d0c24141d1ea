//! Flat-file subscription store.
//!
//! Subscriptions live in a single JSON file: a list of feed descriptor
//! records with camelCase keys (`xmlUrl`, `htmlUrl`). The core pipeline
//! only ever reads descriptors; all mutation happens here, and every save
//! goes through an atomic write.

use std::path::Path;

use thiserror::Error;
use url::Url;

use crate::feed::{FeedDescriptor, UNCATEGORIZED};
use crate::util::atomic_write;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access subscriptions file: {0}")]
    Io(#[from] std::io::Error),

    #[error("subscriptions file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("already subscribed: {0}")]
    Duplicate(String),

    #[error("invalid feed URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Loads the subscription list. A missing file is an empty list, not an
/// error.
pub fn load(path: &Path) -> Result<Vec<FeedDescriptor>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::Io(e)),
    };
    Ok(serde_json::from_str(&content)?)
}

/// Persists the subscription list atomically.
pub fn save(path: &Path, feeds: &[FeedDescriptor]) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(feeds)?;
    atomic_write(path, &json)?;
    Ok(())
}

/// Finds a subscription by display name or feed URL.
pub fn find<'a>(feeds: &'a [FeedDescriptor], identifier: &str) -> Option<&'a FeedDescriptor> {
    feeds
        .iter()
        .find(|f| f.name == identifier || f.xml_url == identifier)
}

/// Appends a new subscription.
///
/// The URL must be http(s) and not already subscribed. When no name is
/// given, the URL host stands in. Returns the descriptor as stored.
pub fn add(
    feeds: &mut Vec<FeedDescriptor>,
    url: &str,
    name: Option<String>,
    category: Option<String>,
    html_url: Option<String>,
) -> Result<FeedDescriptor, StoreError> {
    let parsed = Url::parse(url).map_err(|e| StoreError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(StoreError::InvalidUrl {
            url: url.to_string(),
            reason: "scheme must be http or https".to_string(),
        });
    }

    if let Some(existing) = feeds.iter().find(|f| f.xml_url == url) {
        return Err(StoreError::Duplicate(existing.name.clone()));
    }

    let name = name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| "Unnamed".to_string());

    let feed = FeedDescriptor {
        name,
        xml_url: url.to_string(),
        html_url,
        category: Some(category.unwrap_or_else(|| UNCATEGORIZED.to_string())),
    };
    feeds.push(feed.clone());
    Ok(feed)
}

/// Removes every subscription whose name or URL equals `identifier`,
/// returning the removed records.
pub fn remove(feeds: &mut Vec<FeedDescriptor>, identifier: &str) -> Vec<FeedDescriptor> {
    let (removed, remaining): (Vec<_>, Vec<_>) = feeds
        .drain(..)
        .partition(|f| f.name == identifier || f.xml_url == identifier);
    *feeds = remaining;
    removed
}
