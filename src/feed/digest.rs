use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::feed::coordinator::FetchOutcome;
use crate::feed::types::{CanonicalItem, InvalidConfig};

/// Placeholder substituted for a missing or empty feed category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One category's slice of a digest, built fresh each run.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestGroup {
    pub category: String,
    /// The first `per_category` surviving items, newest first.
    pub items: Vec<CanonicalItem>,
    /// True item count before the display cut, so callers can report
    /// "N more" overflow.
    pub total: usize,
}

/// Builds a time-windowed, category-grouped view over all fetch outcomes.
///
/// Failed feeds contribute zero items and are dropped silently; a broken
/// feed is never an aggregate error. Items without a parsed timestamp or
/// dated strictly before `since` are excluded. Surviving items are sorted
/// newest first (the sort is stable, so equal timestamps keep feed
/// iteration order) and partitioned by category; groups come back in
/// ascending category-name order.
///
/// An empty result can mean "no items in window" or "every feed failed";
/// callers that need to tell these apart count failures in `outcomes`
/// before handing them over.
pub fn digest(
    outcomes: Vec<FetchOutcome>,
    since: NaiveDateTime,
    per_category: usize,
) -> Result<Vec<DigestGroup>, InvalidConfig> {
    if per_category == 0 {
        return Err(InvalidConfig::ZeroCategoryLimit);
    }

    let mut survivors: Vec<CanonicalItem> = outcomes
        .into_iter()
        .filter_map(|o| o.result.ok())
        .flatten()
        .filter(|item| item.published_at.is_some_and(|ts| ts >= since))
        .collect();

    survivors.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    let mut grouped: BTreeMap<String, Vec<CanonicalItem>> = BTreeMap::new();
    for item in survivors {
        let category = if item.source_category.trim().is_empty() {
            UNCATEGORIZED.to_string()
        } else {
            item.source_category.clone()
        };
        grouped.entry(category).or_default().push(item);
    }

    Ok(grouped
        .into_iter()
        .map(|(category, mut items)| {
            let total = items.len();
            items.truncate(per_category);
            DigestGroup {
                category,
                items,
                total,
            }
        })
        .collect())
}
