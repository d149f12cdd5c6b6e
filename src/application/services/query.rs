use crate::application::services::reconcile;
use crate::domain::entities::{Post, Reply};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Newest,
    Oldest,
    MostReplied,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFilters {
    pub search: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub sort: SortMode,
}

impl PostFilters {
    /// Any search text or category filter forces a network fetch; only the
    /// unfiltered listing is served from cache.
    pub fn bypasses_cache(&self) -> bool {
        self.search.as_deref().is_some_and(|s| !s.is_empty()) || self.category.is_some()
    }
}

/// Apply search and category filters over a snapshot of the collection.
pub fn filter_posts(posts: &[Post], filters: &PostFilters) -> Vec<Post> {
    posts
        .iter()
        .filter(|post| {
            filters
                .search
                .as_deref()
                .map_or(true, |query| post.matches_query(query))
        })
        .filter(|post| {
            filters
                .category
                .as_deref()
                .map_or(true, |category| post.category == category)
        })
        .cloned()
        .collect()
}

/// Sort purely client-side over whatever is currently held. A most-replied
/// sort issued before replies have loaded sees every post as zero-replied;
/// the view re-sorts once they arrive. Ties fall back to recency so equal
/// counts never flicker.
pub fn sort_posts(posts: &mut [Post], mode: SortMode, replies: &[Reply]) {
    match mode {
        SortMode::Newest => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortMode::Oldest => posts.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortMode::MostReplied => {
            let counts = reconcile::reply_counts(posts, replies);
            posts.sort_by(|a, b| {
                let count_a = counts.get(&a.id).copied().unwrap_or(0);
                let count_b = counts.get(&b.id).copied().unwrap_or(0);
                count_b
                    .cmp(&count_a)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });
        }
    }
}

/// Collapses bursts of search keystrokes into a single fetch: each call bumps
/// an epoch, sleeps the quiet period, and only the call still holding the
/// latest epoch afterwards proceeds.
#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    quiet_period: Duration,
    epoch: Arc<AtomicU64>,
}

impl SearchDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns true if no newer call superseded this one during the quiet
    /// period.
    pub async fn settle(&self) -> bool {
        let my_epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.quiet_period).await;
        self.epoch.load(Ordering::SeqCst) == my_epoch
    }
}
