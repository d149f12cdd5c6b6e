pub mod forum_service;
pub mod query;
pub mod reconcile;

pub use forum_service::ForumService;
pub use query::{PostFilters, SearchDebouncer, SortMode};
