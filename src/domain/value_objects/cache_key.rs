use serde::{Deserialize, Serialize};
use std::fmt;

const UNFILTERED_POSTS_KEY: &str = "posts:all";

/// Key into the listing cache. Only the unfiltered post listing is
/// meaningfully cached; any filtered query bypasses the cache entirely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn posts() -> Self {
        Self(UNFILTERED_POSTS_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
