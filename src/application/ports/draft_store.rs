use crate::domain::entities::Draft;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Durable local key-value storage for compose drafts.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save(&self, draft: Draft) -> Result<(), AppError>;
    async fn load(&self, key: &str) -> Result<Option<Draft>, AppError>;
    async fn clear(&self, key: &str) -> Result<(), AppError>;
}
