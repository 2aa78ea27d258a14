//! Export functionality: attachments to disk.

pub mod attachment;
