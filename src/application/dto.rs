use crate::domain::entities::{Post, Reply};
use crate::domain::value_objects::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

// Response DTOs — the shapes the authoritative store sends back.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDto {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostDto {
    pub fn into_entity(self) -> Post {
        Post {
            id: EntityId::durable(self.id),
            author_id: self.author_id,
            author_name: self.author_name,
            title: self.title,
            content: self.content,
            category: self.category,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
            is_optimistic: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyDto {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ReplyDto {
    pub fn into_entity(self) -> Reply {
        Reply {
            id: EntityId::durable(self.id),
            post_id: EntityId::durable(self.post_id),
            author_id: self.author_id,
            author_name: self.author_name,
            content: self.content,
            created_at: self.created_at,
            is_optimistic: false,
        }
    }
}

// Mutation payloads — what callers hand the coordinator.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostPayload {
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Validate for CreatePostPayload {
    fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.content.trim().is_empty() {
            return Err("content must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl UpdatePostPayload {
    /// Merge the partial update into an entity for the optimistic apply.
    pub fn apply_to(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(category) = &self.category {
            post.category = category.clone();
        }
        if let Some(tags) = &self.tags {
            post.tags = tags.clone();
        }
    }
}

impl Validate for UpdatePostPayload {
    fn validate(&self) -> Result<(), String> {
        if self.title.is_none()
            && self.content.is_none()
            && self.category.is_none()
            && self.tags.is_none()
        {
            return Err("update must change at least one field".to_string());
        }
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err("title must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReplyPayload {
    pub post_id: EntityId,
    pub content: String,
}

impl Validate for CreateReplyPayload {
    fn validate(&self) -> Result<(), String> {
        if self.content.trim().is_empty() {
            return Err("content must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReplyPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl UpdateReplyPayload {
    pub fn apply_to(&self, reply: &mut Reply) {
        if let Some(content) = &self.content {
            reply.content = content.clone();
        }
    }
}

impl Validate for UpdateReplyPayload {
    fn validate(&self) -> Result<(), String> {
        match &self.content {
            None => Err("update must change at least one field".to_string()),
            Some(content) if content.trim().is_empty() => {
                Err("content must not be empty".to_string())
            }
            Some(_) => Ok(()),
        }
    }
}
