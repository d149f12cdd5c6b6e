use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User-authored compose-box text, persisted through the DraftStore port so a
/// navigation away does not lose it. Not authoritative over entity state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub key: String,
    pub text: String,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            updated_at: Utc::now(),
        }
    }
}
