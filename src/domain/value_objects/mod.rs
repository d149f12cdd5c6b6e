pub mod cache_key;
pub mod entity_id;

pub use cache_key::CacheKey;
pub use entity_id::EntityId;
