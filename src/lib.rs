//! brief: a terminal RSS/Atom reader that turns feed subscriptions into
//! time-windowed digests.
//!
//! The core pipeline lives in [`feed`]: normalize raw documents into
//! canonical items, fetch many feeds concurrently with per-feed fault
//! isolation, and aggregate the results into category-grouped digests.
//! Everything around it is plumbing: the JSON subscription [`store`],
//! [`opml`] import/export, the TOML [`config`] file, and plain-text
//! [`render`]ing for the [`cli`].

pub mod cli;
pub mod config;
pub mod feed;
pub mod opml;
pub mod render;
pub mod store;
pub mod util;
