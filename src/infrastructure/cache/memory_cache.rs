use crate::application::ports::cache::ListingCache;
use crate::application::ports::clock::{Clock, SystemClock};
use crate::domain::entities::Post;
use crate::domain::value_objects::CacheKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
struct CacheEntry<T> {
    data: T,
    fetched_at: Instant,
}

/// In-memory TTL memoization. Freshness is judged against the injected clock
/// so tests control it deterministically; there is no background eviction —
/// an expired entry simply stops being served and is overwritten by the next
/// put. Overlapping fetches against a cold key are not deduplicated: whichever
/// response is stored last wins.
pub struct MemoryCache<T: Clone> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T> MemoryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if self.clock.now().duration_since(entry.fetched_at) < self.ttl {
            Some(entry.data.clone())
        } else {
            None
        }
    }

    pub async fn put(&self, key: String, value: T) {
        let entry = CacheEntry {
            data: value,
            fetched_at: self.clock.now(),
        };
        self.entries.write().await.insert(key, entry);
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

/// The post-listing cache behind the [`ListingCache`] port.
pub struct PostListingCache {
    inner: MemoryCache<Vec<Post>>,
}

impl PostListingCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: MemoryCache::new(ttl, clock),
        }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self {
            inner: MemoryCache::with_system_clock(ttl),
        }
    }
}

#[async_trait]
impl ListingCache for PostListingCache {
    async fn get(&self, key: &CacheKey) -> Option<Vec<Post>> {
        self.inner.get(key.as_str()).await
    }

    async fn put(&self, key: CacheKey, posts: Vec<Post>) {
        self.inner.put(key.as_str().to_string(), posts).await;
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.inner.invalidate(key.as_str()).await;
    }
}
