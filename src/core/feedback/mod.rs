// Core feedback module - the submission flow and the store it writes to.

pub mod feedback_models;
pub mod feedback_service;
pub mod feedback_store;
pub mod name_generator;

pub use feedback_models::*;
pub use feedback_service::FeedbackService;
pub use feedback_store::{FeedbackStore, StoreError};
