//! SQLite persistence for feeds, articles and pins.
//!
//! [`Database`] is a cloneable handle over an `sqlx` pool. Queries live in
//! per-table modules as inherent methods; multi-statement writes that must be
//! all-or-nothing (a feed refresh, a feed registration) run in one transaction.

mod articles;
mod feeds;
mod pins;
mod schema;
mod types;

pub use schema::Database;
pub use types::{
    Article, ArticleUpdate, DatabaseError, ExistingArticle, Feed, FeedArticleCounts, NewArticle,
};
