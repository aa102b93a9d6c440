//! Fetching and parsing of RSS/Atom/JSON feeds.
//!
//! - [`parser`] normalizes `feed-rs` output into [`FeedDocument`]s
//! - [`fetcher`] retrieves feeds over HTTP with retry, timeout and size limits
//!
//! The synchronization engine only depends on the [`FeedSource`] trait, so
//! tests can drive it with scripted documents instead of a network.
//!
//! # Example
//!
//! ```no_run
//! use feedsync::feed::{FeedSource, FetcherConfig, HttpFetcher};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new(FetcherConfig::default())?;
//! let doc = fetcher.fetch("https://example.com/feed.xml").await?;
//! println!("{} items", doc.items.len());
//! # Ok(())
//! # }
//! ```

mod fetcher;
mod parser;

use std::future::Future;
use std::sync::Arc;

pub use fetcher::{FetchError, FetcherConfig, HttpFetcher, TransportError};
pub use parser::{parse_feed, FeedDocument, FeedItem, FeedMeta};

/// Turns a feed URL into a normalized document.
pub trait FeedSource: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FeedDocument, FetchError>> + Send;
}

impl<T: FeedSource> FeedSource for Arc<T> {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FeedDocument, FetchError>> + Send {
        (**self).fetch(url)
    }
}
