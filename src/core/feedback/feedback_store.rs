use super::feedback_models::{FeedbackEntry, NewFeedback};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Store responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only record store for feedback.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Append a record and return the id the store generated for it.
    async fn append(&self, feedback: NewFeedback) -> Result<String, StoreError>;

    /// All records, newest first.
    async fn list_recent(&self) -> Result<Vec<FeedbackEntry>, StoreError>;
}

// Lets main pick a store at runtime from the environment.
#[async_trait]
impl FeedbackStore for Box<dyn FeedbackStore> {
    async fn append(&self, feedback: NewFeedback) -> Result<String, StoreError> {
        (**self).append(feedback).await
    }

    async fn list_recent(&self) -> Result<Vec<FeedbackEntry>, StoreError> {
        (**self).list_recent().await
    }
}
