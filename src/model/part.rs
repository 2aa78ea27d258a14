//! Decoded body segments: displayable content parts and attachments.

use serde::{Deserialize, Serialize};

/// One decoded, non-attachment body segment (plain text, HTML, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Lower-cased `type/subtype`, parameters stripped (e.g. `"text/plain"`).
    #[serde(rename = "type")]
    pub media_type: String,

    /// The full `Content-Type` value including parameters, or `"text/plain"`
    /// when the segment had none.
    #[serde(rename = "content_type")]
    pub raw_content_type: String,

    /// Transfer-decoded content. No charset conversion is applied.
    pub body: String,

    /// Byte length of `body`.
    pub size: usize,
}

impl ContentPart {
    pub fn new(media_type: String, raw_content_type: String, body: String) -> Self {
        let size = body.len();
        Self {
            media_type,
            raw_content_type,
            body,
            size,
        }
    }
}

/// One decoded leaf segment classified as an attachment.
///
/// The decoded payload is retained in `content` so that downloads keyed by
/// Content-ID never need the raw source again. It is not part of the JSON
/// shape the server uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// `Content-ID` without the surrounding angle brackets (empty if absent).
    #[serde(rename = "cid", default)]
    pub content_id: String,

    /// Lower-cased `type/subtype`, parameters stripped.
    #[serde(rename = "type")]
    pub media_type: String,

    /// Disposition `filename`, or Content-Type `name`, possibly empty.
    #[serde(default)]
    pub filename: String,

    /// The full original `Content-Type` value.
    #[serde(rename = "content_type")]
    pub raw_content_type: String,

    /// Byte length of the decoded content.
    pub size: usize,

    /// Decoded payload.
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// The flattened result of decomposing one message.
///
/// Both sequences keep depth-first encounter order; nesting depth is not
/// recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decomposition {
    pub parts: Vec<ContentPart>,
    pub attachments: Vec<Attachment>,
}

impl Decomposition {
    /// First content part whose media type equals `media_type` (case-insensitive).
    pub fn part_of_type(&self, media_type: &str) -> Option<&ContentPart> {
        find_part(&self.parts, media_type)
    }

    /// Attachment whose Content-ID equals `cid`. Angle brackets on `cid` are ignored.
    pub fn attachment_by_cid(&self, cid: &str) -> Option<&Attachment> {
        find_by_cid(&self.attachments, cid)
    }
}

pub(crate) fn find_part<'a>(parts: &'a [ContentPart], media_type: &str) -> Option<&'a ContentPart> {
    parts
        .iter()
        .find(|p| p.media_type.eq_ignore_ascii_case(media_type))
}

pub(crate) fn find_by_cid<'a>(attachments: &'a [Attachment], cid: &str) -> Option<&'a Attachment> {
    let cid = cid.trim().trim_matches(|c| c == '<' || c == '>');
    if cid.is_empty() {
        return None;
    }
    attachments.iter().find(|a| a.content_id == cid)
}
