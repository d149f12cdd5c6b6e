use crate::domain::entities::Post;
use crate::domain::value_objects::CacheKey;
use async_trait::async_trait;

/// Time-bounded memoization of post listings.
#[async_trait]
pub trait ListingCache: Send + Sync {
    /// The cached value, if the entry exists and is inside its TTL window.
    async fn get(&self, key: &CacheKey) -> Option<Vec<Post>>;

    /// Store a listing stamped with the current instant.
    async fn put(&self, key: CacheKey, posts: Vec<Post>);

    /// Drop an entry regardless of freshness.
    async fn invalidate(&self, key: &CacheKey);
}
