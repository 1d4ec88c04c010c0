pub mod in_memory;
pub mod realtime_store;
pub mod sqlite_store;

pub use in_memory::InMemoryFeedbackStore;
pub use realtime_store::RealtimeDbFeedbackStore;
pub use sqlite_store::SqliteFeedbackStore;
