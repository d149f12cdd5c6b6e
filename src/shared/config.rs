use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for the unfiltered post listing, in seconds.
    pub posts_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Quiet period before a search keystroke triggers a filtered fetch.
    pub debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "https://api.example.com/v1".to_string(),
                request_timeout_secs: 30,
            },
            cache: CacheConfig {
                posts_ttl_secs: 300, // 5 minutes
            },
            search: SearchConfig { debounce_ms: 400 },
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FORUM_API_BASE_URL") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.api.base_url = trimmed.trim_end_matches('/').to_string();
            }
        }
        if let Some(value) = env_u64("FORUM_REQUEST_TIMEOUT_SECS") {
            cfg.api.request_timeout_secs = value.max(1);
        }
        if let Some(value) = env_u64("FORUM_CACHE_TTL_SECS") {
            cfg.cache.posts_ttl_secs = value;
        }
        if let Some(value) = env_u64("FORUM_SEARCH_DEBOUNCE_MS") {
            cfg.search.debounce_ms = value;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.api.base_url.is_empty() {
            return Err("api.base_url must not be empty".to_string());
        }
        if self.api.request_timeout_secs == 0 {
            return Err("api.request_timeout_secs must be greater than 0".to_string());
        }
        if self.cache.posts_ttl_secs == 0 {
            return Err("cache.posts_ttl_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}
