//! `sendria` — client library and test harness for the Sendria development
//! SMTP server.
//!
//! The core is a MIME decomposer that turns a captured message's raw source
//! into displayable content parts and attachments. Around it sit a typed
//! client for the Sendria REST API (over a caller-supplied transport), an
//! LRU-cached store of decomposed messages, and polling helpers for
//! integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod harness;
pub mod model;
pub mod parser;
pub mod store;
