// Feedback service - the submission flow.
//
// submit(name, text):
// - blank name -> generated display name
// - blank text -> rejected before moderation
// - moderation verdict decides reject / mask / store
// - store failures are reported once, never retried
//
// NO presentation dependencies here; errors carry the status line the caller shows.

use super::feedback_models::{FeedbackEntry, NewFeedback, SubmissionReceipt};
use super::feedback_store::{FeedbackStore, StoreError};
use super::name_generator::random_display_name;
use crate::core::moderation::{Category, ModerationService, ModerationVerdict, VerdictReason};
use chrono::Utc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" Reason: {}", r))
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Please enter feedback before submitting.")]
    EmptyText,

    #[error("Feedback rejected.")]
    Irrelevant { reason: Option<String> },

    #[error("Please enter a clear, constructive feedback message.{}", reason_suffix(.reason))]
    NotFeedback { reason: Option<String> },

    #[error("Your feedback contains disallowed content and was not submitted.")]
    Disallowed,

    #[error("Personal attacks are not accepted. Please provide constructive, impartial feedback.")]
    PersonalAttack,

    #[error("Feedback storage is not configured. Please try again later.")]
    StoreNotConfigured,

    #[error("Failed to submit feedback: {0}")]
    Store(#[source] StoreError),

    #[error("Unable to load feedbacks ({0}).")]
    Load(#[source] StoreError),
}

impl FeedbackError {
    /// The content was refused; rewording it can fix the problem.
    pub fn is_policy_rejection(&self) -> bool {
        !self.is_unavailable()
    }

    /// Something on our side failed; the same text may go through later.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            FeedbackError::StoreNotConfigured | FeedbackError::Store(_) | FeedbackError::Load(_)
        )
    }

    /// Status line to show the visitor.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Map a verdict onto the rejection it implies, if any.
fn rejection_for(verdict: &ModerationVerdict) -> Option<FeedbackError> {
    if !verdict.is_feedback {
        if verdict.reason_is(VerdictReason::ContactOrSolicitation)
            || verdict.has_category(Category::Irrelevant)
        {
            return Some(FeedbackError::Irrelevant {
                reason: verdict.reason.clone(),
            });
        }
        return Some(FeedbackError::NotFeedback {
            reason: verdict.reason.clone(),
        });
    }

    if verdict.blocked
        || verdict.has_category(Category::Threat)
        || verdict.has_category(Category::Sexual)
    {
        return Some(FeedbackError::Disallowed);
    }

    if verdict.is_personal_attack() {
        return Some(FeedbackError::PersonalAttack);
    }

    None
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct FeedbackService<S: FeedbackStore> {
    moderation: ModerationService,
    store: Option<S>,
}

impl<S: FeedbackStore> FeedbackService<S> {
    /// `store` is `None` when no store is configured; moderation still works.
    pub fn new(moderation: ModerationService, store: Option<S>) -> Self {
        Self { moderation, store }
    }

    /// Moderate `text` without storing anything.
    pub async fn check(&self, text: &str) -> ModerationVerdict {
        self.moderation.classify(text.trim()).await
    }

    /// Moderate and, if accepted, store a piece of feedback.
    pub async fn submit(&self, name: &str, text: &str) -> Result<SubmissionReceipt, FeedbackError> {
        let name = match name.trim() {
            "" => random_display_name(),
            given => given.to_string(),
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(FeedbackError::EmptyText);
        }

        let verdict = self.moderation.classify(text).await;
        if let Some(rejection) = rejection_for(&verdict) {
            tracing::info!(
                name = %name,
                reason = ?verdict.reason,
                "Feedback rejected by moderation"
            );
            return Err(rejection);
        }

        let final_text = if verdict.masked.is_empty() {
            text.to_string()
        } else {
            verdict.masked.clone()
        };
        let masked = final_text != text;

        let Some(store) = &self.store else {
            tracing::warn!("Feedback accepted but no store is configured");
            return Err(FeedbackError::StoreNotConfigured);
        };

        let feedback = NewFeedback {
            name,
            text: final_text,
            created_at: Utc::now(),
        };

        let id = store.append(feedback.clone()).await.map_err(|e| {
            tracing::error!("Failed to store feedback: {}", e);
            FeedbackError::Store(e)
        })?;

        tracing::info!(id = %id, name = %feedback.name, masked, "Feedback stored");

        Ok(SubmissionReceipt {
            entry: FeedbackEntry::from_new(id, feedback),
            masked,
            verdict,
        })
    }

    /// All stored feedback, newest first.
    pub async fn list(&self) -> Result<Vec<FeedbackEntry>, FeedbackError> {
        let store = self
            .store
            .as_ref()
            .ok_or(FeedbackError::StoreNotConfigured)?;
        store.list_recent().await.map_err(|e| {
            tracing::error!("Failed to load feedback: {}", e);
            FeedbackError::Load(e)
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
