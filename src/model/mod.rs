//! Core data model types: captured messages, recipients, content parts and attachments.

pub mod message;
pub mod part;
pub mod recipient;
