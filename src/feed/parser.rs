use feed_rs::model::Entry;
use feed_rs::parser::{self, ParseFeedError};

use crate::util::resolve_link;

/// Feed-level metadata of a fetched document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedMeta {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// One normalized entry of a fetched document.
///
/// `url` is `None` when the entry carries no usable link; such items cannot be
/// identified across runs and are dropped by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub url: Option<String>,
    pub title: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<i64>,
    pub thumbnail_url: Option<String>,
}

/// A fetched and parsed feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub meta: FeedMeta,
    pub items: Vec<FeedItem>,
}

/// Parse RSS/Atom/JSON Feed bytes into a [`FeedDocument`].
///
/// `base_url` is the feed's own URL, used to resolve relative entry links.
pub fn parse_feed(bytes: &[u8], base_url: &str) -> Result<FeedDocument, ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let meta = FeedMeta {
        title: feed.title.map(|t| t.content).and_then(non_blank),
        description: feed.description.map(|t| t.content).and_then(non_blank),
    };

    let items = feed
        .entries
        .into_iter()
        .map(|entry| normalize_entry(entry, base_url))
        .collect();

    Ok(FeedDocument { meta, items })
}

fn normalize_entry(entry: Entry, base_url: &str) -> FeedItem {
    let url = entry_link(&entry, base_url);
    let thumbnail_url = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .find_map(|t| resolve_link(base_url, &t.image.uri));

    FeedItem {
        url,
        title: entry
            .title
            .map(|t| t.content)
            .and_then(non_blank)
            .unwrap_or_else(|| "Untitled".to_string()),
        content: entry.content.and_then(|c| c.body).and_then(non_blank),
        summary: entry.summary.map(|s| s.content).and_then(non_blank),
        author: entry
            .authors
            .into_iter()
            .next()
            .map(|p| p.name)
            .and_then(non_blank),
        published_at: entry.published.or(entry.updated).map(|dt| dt.timestamp()),
        thumbnail_url,
    }
}

/// Prefer an `alternate` (or untyped) link, then any link, then an id that is itself a URL
fn entry_link(entry: &Entry, base_url: &str) -> Option<String> {
    let alternate = entry
        .links
        .iter()
        .filter(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .find_map(|l| resolve_link(base_url, &l.href));

    alternate
        .or_else(|| {
            entry
                .links
                .iter()
                .find_map(|l| resolve_link(base_url, &l.href))
        })
        .or_else(|| {
            let id = entry.id.trim();
            if id.starts_with("http://") || id.starts_with("https://") {
                resolve_link(base_url, id)
            } else {
                None
            }
        })
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}
