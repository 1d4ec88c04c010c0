// Feedback domain models - what gets stored and what a submission returns.

use crate::core::moderation::ModerationVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection (or path) every store keeps feedback under.
pub const FEEDBACK_COLLECTION: &str = "feedbacks";

/// Shown for entries stored without a name.
pub const ANONYMOUS: &str = "Anonymous";

/// A feedback record about to be appended to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedback {
    pub name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A stored feedback record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    /// Opaque id generated by the store
    pub id: String,
    pub name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl FeedbackEntry {
    pub fn from_new(id: String, feedback: NewFeedback) -> Self {
        Self {
            id,
            name: feedback.name,
            text: feedback.text,
            created_at: feedback.created_at,
        }
    }

    pub fn display_name(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() {
            ANONYMOUS
        } else {
            name
        }
    }
}

/// Sort newest first, the order every listing is shown in.
pub fn sort_newest_first(entries: &mut [FeedbackEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// What a successful submission stored.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub entry: FeedbackEntry,
    /// The stored text differs from what was submitted because words were masked
    pub masked: bool,
    pub verdict: ModerationVerdict,
}

impl SubmissionReceipt {
    pub fn status_message(&self) -> &'static str {
        if self.masked {
            "Offensive words were masked; submitting edited feedback."
        } else {
            "Feedback submitted."
        }
    }
}
