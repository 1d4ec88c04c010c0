// In-memory feedback store. Nothing survives a restart; used for dry runs
// (`FEEDBACK_STORE=memory`) and wherever a real store is not wanted.

use crate::core::feedback::{
    sort_newest_first, FeedbackEntry, FeedbackStore, NewFeedback, StoreError,
};
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// DashMap keeps concurrent submissions from needing a Mutex.
pub struct InMemoryFeedbackStore {
    entries: DashMap<String, FeedbackEntry>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for InMemoryFeedbackStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn append(&self, feedback: NewFeedback) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.entries
            .insert(id.clone(), FeedbackEntry::from_new(id.clone(), feedback));
        Ok(id)
    }

    async fn list_recent(&self) -> Result<Vec<FeedbackEntry>, StoreError> {
        let mut entries: Vec<FeedbackEntry> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        sort_newest_first(&mut entries);
        Ok(entries)
    }
}
