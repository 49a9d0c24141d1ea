//! Feed ingestion and aggregation.
//!
//! The pipeline runs in stages, each isolated per feed:
//!
//! - [`normalizer`] - detect RSS 2.0 vs Atom and map raw XML into canonical
//!   items
//! - [`fetcher`] - one bounded-timeout GET per feed
//! - [`coordinator`] - run fetch+normalize for many feeds under a bounded
//!   pool, collecting one outcome per feed
//! - [`digest`] - time-window filter, merge, and category-grouped ordering
//!
//! A broken feed degrades its own contribution to zero items and nothing
//! else; there is no fail-fast path anywhere in the pipeline.

mod coordinator;
mod digest;
mod fetcher;
mod normalizer;
mod types;

pub use coordinator::{fetch_all, FetchOutcome};
pub use digest::{digest, DigestGroup, UNCATEGORIZED};
pub use fetcher::{build_client, fetch_bytes, USER_AGENT};
pub use normalizer::normalize;
pub use types::{
    CanonicalItem, FeedDescriptor, FetchConfig, FetchError, InvalidConfig, NormalizeConfig,
    ParseError, MAX_CONCURRENCY,
};
