use super::user::CurrentUser;
use crate::domain::value_objects::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: EntityId,
    pub author_id: String,
    pub author_name: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_optimistic: bool,
}

impl Post {
    /// Build the optimistic placeholder inserted before the remote store has
    /// confirmed the create. Carries a session-local id until reconciliation.
    pub fn new_optimistic(
        title: String,
        content: String,
        category: String,
        tags: Vec<String>,
        author: &CurrentUser,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::local(),
            author_id: author.id.clone(),
            author_name: author.display_name.clone(),
            title,
            content,
            category,
            tags,
            created_at: now,
            updated_at: now,
            is_optimistic: true,
        }
    }

    /// Case-insensitive substring match over title, content, and tags.
    /// An empty query matches everything.
    pub fn matches_query(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&needle))
    }
}
