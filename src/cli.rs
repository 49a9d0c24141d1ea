//! Command-line surface: argument definitions and command handlers.
//!
//! Commands are thin wrappers around the store, OPML, and feed modules;
//! anything with real behavior lives there so it can be tested without a
//! terminal.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::feed::{self, FetchError};
use crate::{opml, render, store};

#[derive(Parser, Debug)]
#[command(name = "brief", about = "Terminal RSS/Atom reader with time-windowed digests")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all subscriptions
    List {
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,
        /// Show feed URLs
        #[arg(short, long)]
        verbose: bool,
    },
    /// Add a subscription
    Add {
        /// RSS/Atom feed URL
        url: String,
        /// Custom name (defaults to the URL host)
        #[arg(short, long)]
        name: Option<String>,
        /// Category
        #[arg(short, long)]
        category: Option<String>,
        /// Website URL
        #[arg(long)]
        html_url: Option<String>,
    },
    /// Remove a subscription by name or URL
    Remove { identifier: String },
    /// Check the health of every subscribed feed
    Check,
    /// Fetch the latest items from one feed
    Fetch {
        /// Feed name or URL
        identifier: String,
        /// Number of items
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
        /// Show item links
        #[arg(short, long)]
        verbose: bool,
        /// Fetch full article content where the feed provides it
        #[arg(long)]
        full_content: bool,
    },
    /// Show a digest of recent updates across all feeds
    Digest {
        /// Look back N days instead of starting at midnight today
        #[arg(short, long)]
        days: Option<u32>,
        /// Items shown per category
        #[arg(short = 'n', long, default_value_t = 3)]
        limit: usize,
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,
        /// Show item links
        #[arg(short, long)]
        verbose: bool,
        /// Check at most N feeds (0 = all)
        #[arg(long, default_value_t = 0)]
        max_feeds: usize,
    },
    /// Import subscriptions from an OPML file
    Import { file: PathBuf },
    /// Export subscriptions to an OPML file
    Export {
        /// Output path (defaults to rss_export_<date>.opml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run(args: Args, config: Config, feeds_path: PathBuf) -> Result<()> {
    match args.command {
        Command::List { category, verbose } => cmd_list(&feeds_path, category, verbose),
        Command::Add {
            url,
            name,
            category,
            html_url,
        } => cmd_add(&feeds_path, &url, name, category, html_url),
        Command::Remove { identifier } => cmd_remove(&feeds_path, &identifier),
        Command::Check => cmd_check(&feeds_path, &config).await,
        Command::Fetch {
            identifier,
            limit,
            verbose,
            full_content,
        } => cmd_fetch(&feeds_path, &config, &identifier, limit, verbose, full_content).await,
        Command::Digest {
            days,
            limit,
            category,
            verbose,
            max_feeds,
        } => cmd_digest(&feeds_path, &config, days, limit, category, verbose, max_feeds).await,
        Command::Import { file } => cmd_import(&feeds_path, &file),
        Command::Export { output } => cmd_export(&feeds_path, output),
    }
}

fn cmd_list(feeds_path: &std::path::Path, category: Option<String>, verbose: bool) -> Result<()> {
    let mut feeds = store::load(feeds_path).context("failed to load subscriptions")?;
    if let Some(cat) = &category {
        feeds.retain(|f| f.category.as_deref() == Some(cat.as_str()));
    }
    print!("{}", render::render_list(&feeds, verbose));
    Ok(())
}

fn cmd_add(
    feeds_path: &std::path::Path,
    url: &str,
    name: Option<String>,
    category: Option<String>,
    html_url: Option<String>,
) -> Result<()> {
    let mut feeds = store::load(feeds_path).context("failed to load subscriptions")?;
    match store::add(&mut feeds, url, name, category, html_url) {
        Ok(added) => {
            store::save(feeds_path, &feeds).context("failed to save subscriptions")?;
            println!("Added: {}", added.name);
            println!(
                "  Category: {}",
                added.category.as_deref().unwrap_or(feed::UNCATEGORIZED)
            );
            Ok(())
        }
        Err(store::StoreError::Duplicate(name)) => {
            println!("Already exists: {name}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_remove(feeds_path: &std::path::Path, identifier: &str) -> Result<()> {
    let mut feeds = store::load(feeds_path).context("failed to load subscriptions")?;
    let removed = store::remove(&mut feeds, identifier);
    if removed.is_empty() {
        println!("Not found: {identifier}");
        return Ok(());
    }
    store::save(feeds_path, &feeds).context("failed to save subscriptions")?;
    for feed in removed {
        println!("Removed: {}", feed.name);
    }
    Ok(())
}

async fn cmd_check(feeds_path: &std::path::Path, config: &Config) -> Result<()> {
    let feeds = store::load(feeds_path).context("failed to load subscriptions")?;
    if feeds.is_empty() {
        println!("No subscriptions");
        return Ok(());
    }

    println!("Checking {} feeds...\n", feeds.len());
    let client = feed::build_client().context("failed to build HTTP client")?;
    let timeout = Duration::from_secs(config.digest_timeout_secs);

    let mut ok = 0usize;
    let mut failed = 0usize;
    for f in &feeds {
        match feed::fetch_bytes(&client, &f.xml_url, timeout).await {
            Ok(bytes) if looks_like_feed(&bytes) => {
                println!("ok      {}", f.name);
                ok += 1;
            }
            Ok(_) => {
                println!("invalid {} - not RSS/Atom content", f.name);
                failed += 1;
            }
            Err(FetchError::HttpStatus(status)) => {
                println!("fail    {} - HTTP {status}", f.name);
                failed += 1;
            }
            Err(e) => {
                println!("fail    {} - {e}", f.name);
                failed += 1;
            }
        }
    }

    println!("\nResult: {ok} OK, {failed} failed");
    Ok(())
}

async fn cmd_fetch(
    feeds_path: &std::path::Path,
    config: &Config,
    identifier: &str,
    limit: usize,
    verbose: bool,
    full_content: bool,
) -> Result<()> {
    let feeds = store::load(feeds_path).context("failed to load subscriptions")?;
    let Some(target) = store::find(&feeds, identifier) else {
        println!("Not found: {identifier}");
        return Ok(());
    };

    println!(
        "Fetching: {}{}\n",
        target.name,
        if full_content { " (full content)" } else { "" }
    );

    let client = feed::build_client().context("failed to build HTTP client")?;
    let bytes = feed::fetch_bytes(
        &client,
        &target.xml_url,
        Duration::from_secs(config.fetch_timeout_secs),
    )
    .await
    .with_context(|| format!("failed to fetch {}", target.xml_url))?;

    let items = feed::normalize(&bytes, target, &config.fetch_normalize(limit, full_content))
        .with_context(|| format!("failed to parse {}", target.xml_url))?;

    print!("{}", render::render_fetch(&items, full_content, verbose));
    Ok(())
}

async fn cmd_digest(
    feeds_path: &std::path::Path,
    config: &Config,
    days: Option<u32>,
    limit: usize,
    category: Option<String>,
    verbose: bool,
    max_feeds: usize,
) -> Result<()> {
    let mut feeds = store::load(feeds_path).context("failed to load subscriptions")?;
    if feeds.is_empty() {
        println!("No subscriptions");
        return Ok(());
    }
    if let Some(cat) = &category {
        feeds.retain(|f| f.category.as_deref() == Some(cat.as_str()));
        if feeds.is_empty() {
            println!("No feeds in category '{cat}'");
            return Ok(());
        }
    }
    if max_feeds > 0 {
        feeds.truncate(max_feeds);
    }

    let now = Local::now().naive_local();
    let since = window_start(now, days);

    let client = feed::build_client().context("failed to build HTTP client")?;
    let outcomes = feed::fetch_all(
        &client,
        feeds,
        &config.digest_fetch(),
        &config.digest_normalize(),
    )
    .await?;

    let checked = outcomes.len();
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    let groups = feed::digest(outcomes, since, limit)?;

    print!(
        "{}",
        render::render_digest(&groups, since, now, checked, failed, verbose)
    );
    Ok(())
}

/// Window start: midnight today by default, or `days` back from now.
fn window_start(now: NaiveDateTime, days: Option<u32>) -> NaiveDateTime {
    match days {
        Some(d) => now
            .checked_sub_signed(chrono::Duration::days(i64::from(d)))
            .unwrap_or(NaiveDateTime::MIN),
        None => now.date().and_time(NaiveTime::MIN),
    }
}

fn cmd_import(feeds_path: &std::path::Path, file: &std::path::Path) -> Result<()> {
    let imported = opml::import_file(file)
        .with_context(|| format!("failed to import OPML from {}", file.display()))?;
    if imported.is_empty() {
        println!("No feeds found in OPML");
        return Ok(());
    }

    let mut feeds = store::load(feeds_path).context("failed to load subscriptions")?;
    let (added, skipped) = opml::merge(&mut feeds, imported);
    store::save(feeds_path, &feeds).context("failed to save subscriptions")?;
    println!("Imported: {added} new, {skipped} skipped");
    Ok(())
}

fn cmd_export(feeds_path: &std::path::Path, output: Option<PathBuf>) -> Result<()> {
    let feeds = store::load(feeds_path).context("failed to load subscriptions")?;
    if feeds.is_empty() {
        println!("No subscriptions to export");
        return Ok(());
    }

    let output = output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "rss_export_{}.opml",
            Local::now().format("%Y%m%d")
        ))
    });
    opml::export_to_file(&feeds, &output)
        .with_context(|| format!("failed to export OPML to {}", output.display()))?;

    let categories: std::collections::BTreeSet<&str> = feeds
        .iter()
        .map(|f| f.category.as_deref().unwrap_or(feed::UNCATEGORIZED))
        .collect();
    println!("Exported: {}", output.display());
    println!("{} feeds, {} categories", feeds.len(), categories.len());
    Ok(())
}

/// Cheap body sniff used by `check`: does this look like a feed document?
fn looks_like_feed(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let head = head.trim_start();
    head.starts_with("<?xml") || head.contains("<rss") || head.contains("<feed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn window_defaults_to_midnight_today() {
        let now = NaiveDate::from_ymd_opt(2026, 1, 10)
            .unwrap()
            .and_hms_opt(14, 30, 45)
            .unwrap();
        let since = window_start(now, None);
        assert_eq!(
            since,
            NaiveDate::from_ymd_opt(2026, 1, 10)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn window_days_counts_back_from_now() {
        let now = NaiveDate::from_ymd_opt(2026, 1, 10)
            .unwrap()
            .and_hms_opt(14, 30, 45)
            .unwrap();
        let since = window_start(now, Some(2));
        assert_eq!(
            since,
            NaiveDate::from_ymd_opt(2026, 1, 8)
                .unwrap()
                .and_hms_opt(14, 30, 45)
                .unwrap()
        );
    }

    #[test]
    fn feed_sniff_accepts_common_shapes() {
        assert!(looks_like_feed(b"<?xml version=\"1.0\"?><rss/>"));
        assert!(looks_like_feed(b"  \n<rss version=\"2.0\"></rss>"));
        assert!(looks_like_feed(
            b"<feed xmlns=\"http://www.w3.org/2005/Atom\"/>"
        ));
        assert!(!looks_like_feed(b"<html><body>404</body></html>"));
        assert!(!looks_like_feed(b"plain text"));
    }
}
