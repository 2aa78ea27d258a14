//! Locally decomposed messages, cached per message id.

pub mod cache;

pub use cache::{MessageStore, DEFAULT_CACHE_SIZE};
