//! Captured messages and message listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::part::{find_by_cid, find_part, Attachment, ContentPart, Decomposition};
use super::recipient::Recipient;
use crate::error::Result;
use crate::parser::mime::{self, DecodeOptions};

/// A message captured by the Sendria server.
///
/// `parts` and `attachments` are only filled when the server supplied them
/// or after [`Message::ensure_decomposed`] has run over `source`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub subject: String,
    pub to: Vec<Recipient>,
    pub from: Vec<Recipient>,
    pub created_at: DateTime<Utc>,
    pub size: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Decompose `source` locally unless parts or attachments are already present.
    ///
    /// A message with an empty source and no parts is left untouched.
    pub fn ensure_decomposed(&mut self, options: &DecodeOptions) -> Result<()> {
        if !self.parts.is_empty() || !self.attachments.is_empty() || self.source.is_empty() {
            return Ok(());
        }
        let Decomposition { parts, attachments } = mime::decompose_with(&self.source, options)?;
        self.parts = parts;
        self.attachments = attachments;
        Ok(())
    }

    /// Body of the first `text/plain` part.
    pub fn plain_text(&self) -> Option<&str> {
        self.part_of_type("text/plain").map(|p| p.body.as_str())
    }

    /// Body of the first `text/html` part.
    pub fn html(&self) -> Option<&str> {
        self.part_of_type("text/html").map(|p| p.body.as_str())
    }

    /// First content part of the given media type.
    pub fn part_of_type(&self, media_type: &str) -> Option<&ContentPart> {
        find_part(&self.parts, media_type)
    }

    /// Attachment with the given Content-ID.
    pub fn attachment_by_cid(&self, cid: &str) -> Option<&Attachment> {
        find_by_cid(&self.attachments, cid)
    }

    /// First attachment whose filename equals `filename`.
    pub fn attachment_by_filename(&self, filename: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.filename == filename)
    }

    /// Whether any `to` recipient has the given address.
    pub fn is_addressed_to(&self, email: &str) -> bool {
        self.to.iter().any(|r| r.matches(email))
    }
}

/// One page of messages as returned by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageList {
    pub messages: Vec<Message>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}
