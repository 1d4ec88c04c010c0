// Core moderation module - decides whether a piece of feedback text may be stored.

pub mod moderation_models;
pub mod moderation_rules;
pub mod moderation_service;

pub use moderation_models::*;
pub use moderation_rules::{ModerationRules, Vocabulary};
pub use moderation_service::{ModerationService, RemoteModeration};
