use crate::application::ports::draft_store::DraftStore;
use crate::domain::entities::Draft;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory DraftStore. Hosts with durable local storage supply their own
/// adapter; this one backs tests and environments without platform storage.
#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<String, Draft>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save(&self, draft: Draft) -> Result<(), AppError> {
        self.drafts.write().await.insert(draft.key.clone(), draft);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Draft>, AppError> {
        Ok(self.drafts.read().await.get(key).cloned())
    }

    async fn clear(&self, key: &str) -> Result<(), AppError> {
        self.drafts.write().await.remove(key);
        Ok(())
    }
}
