use std::collections::HashMap;

use crate::feed::FeedItem;
use crate::storage::{ArticleUpdate, ExistingArticle, NewArticle};

/// Outcome of diffing one fetch against a feed's stored articles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub to_insert: Vec<NewArticle>,
    pub to_update: Vec<ArticleUpdate>,
    pub new_count: usize,
    pub updated_count: usize,
    pub unchanged_count: usize,
    /// Distinct identifiable items in the fetch
    pub total_count: usize,
}

/// Decide which fetched items are new, changed or unchanged.
///
/// Items without a URL are dropped. When one URL occurs several times in a
/// fetch the last occurrence wins, keeping the position of the first.
/// Only `title`, `content`, `summary` and `published_at` are compared.
///
/// `new_count + updated_count + unchanged_count == total_count` always holds.
pub fn reconcile(
    items: &[FeedItem],
    existing: &HashMap<String, ExistingArticle>,
) -> Reconciliation {
    let mut slots: HashMap<&str, usize> = HashMap::with_capacity(items.len());
    let mut distinct: Vec<(&str, &FeedItem)> = Vec::with_capacity(items.len());

    for item in items {
        let Some(url) = item.url.as_deref() else {
            continue;
        };
        match slots.get(url).copied() {
            Some(slot) => distinct[slot].1 = item,
            None => {
                slots.insert(url, distinct.len());
                distinct.push((url, item));
            }
        }
    }

    let mut result = Reconciliation {
        total_count: distinct.len(),
        ..Reconciliation::default()
    };

    for (url, item) in distinct {
        match existing.get(url) {
            None => result.to_insert.push(NewArticle {
                url: url.to_string(),
                title: item.title.clone(),
                content: item.content.clone(),
                summary: item.summary.clone(),
                author: item.author.clone(),
                published_at: item.published_at,
                thumbnail_url: item.thumbnail_url.clone(),
            }),
            Some(stored) if content_changed(stored, item) => {
                result.to_update.push(ArticleUpdate {
                    id: stored.id,
                    title: item.title.clone(),
                    content: item.content.clone(),
                    summary: item.summary.clone(),
                    published_at: item.published_at,
                })
            }
            Some(_) => result.unchanged_count += 1,
        }
    }

    result.new_count = result.to_insert.len();
    result.updated_count = result.to_update.len();
    result
}

fn content_changed(stored: &ExistingArticle, item: &FeedItem) -> bool {
    stored.title != item.title
        || stored.content != item.content
        || stored.summary != item.summary
        || stored.published_at != item.published_at
}
