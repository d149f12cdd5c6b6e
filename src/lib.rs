pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::dto::{
    CreatePostPayload, CreateReplyPayload, UpdatePostPayload, UpdateReplyPayload,
};
pub use application::ports::{
    Clock, CredentialStore, DraftStore, IdentityProvider, ListingCache, SystemClock, Transport,
    TransportRequest, TransportResponse,
};
pub use application::services::{ForumService, PostFilters, SortMode};
pub use domain::entities::{CurrentUser, Draft, Post, Reply};
pub use domain::value_objects::{CacheKey, EntityId};
pub use infrastructure::cache::PostListingCache;
pub use infrastructure::storage::MemoryDraftStore;
pub use infrastructure::transport::HttpTransport;
pub use shared::{AppError, EngineConfig, Result};

/// Install the tracing subscriber. Call once from the host before building
/// the engine.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forum_engine=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
