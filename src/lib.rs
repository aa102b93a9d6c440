//! Feed synchronization for a local RSS/Atom reader.
//!
//! [`sync::FeedSyncEngine`] registers feeds and refreshes them against a
//! [`storage::Database`], using any [`feed::FeedSource`] to fetch documents.
//! [`feed::HttpFetcher`] is the network-backed source.

pub mod config;
pub mod feed;
pub mod storage;
pub mod sync;
pub mod util;
