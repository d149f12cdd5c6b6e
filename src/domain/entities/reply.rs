use super::user::CurrentUser;
use crate::domain::value_objects::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: EntityId,
    /// The owning post. May reference a `Local` post id while the parent is
    /// itself still optimistic; reconciliation matches on either variant.
    pub post_id: EntityId,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_optimistic: bool,
}

impl Reply {
    pub fn new_optimistic(post_id: EntityId, content: String, author: &CurrentUser) -> Self {
        Self {
            id: EntityId::local(),
            post_id,
            author_id: author.id.clone(),
            author_name: author.display_name.clone(),
            content,
            created_at: Utc::now(),
            is_optimistic: true,
        }
    }
}
