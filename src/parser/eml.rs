//! Individual `.eml` files: reading, header summaries and decomposition.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Result, SendriaError};
use crate::model::part::Decomposition;
use crate::model::recipient::Recipient;
use crate::parser::header::{decode_encoded_words, parse_date};
use crate::parser::mime::{self, DecodeOptions};

/// The handful of top-level headers worth showing next to a decomposition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmlSummary {
    pub subject: String,
    pub from: Vec<Recipient>,
    pub to: Vec<Recipient>,
    pub date: Option<DateTime<Utc>>,
    pub message_id: String,
    /// Top-level `Content-Type`, `text/plain` when absent.
    pub content_type: String,
}

/// Read a raw `.eml` file.
pub fn read_eml(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SendriaError::FileNotFound(path.to_path_buf())
        } else {
            SendriaError::io(path, e)
        }
    })
}

/// Read and decompose a `.eml` file.
pub fn decompose_file(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<Decomposition> {
    let raw = read_eml(path)?;
    mime::decompose_bytes(&raw, options)
}

/// Summarize the top-level headers of a raw message.
///
/// Fails under the same framing rules as decomposition.
pub fn summarize(raw: &[u8]) -> Result<EmlSummary> {
    let (headers, _) = mime::frame_message(raw)?;
    let decoded = |name: &str| {
        headers
            .get(name)
            .map(decode_encoded_words)
            .unwrap_or_default()
    };

    Ok(EmlSummary {
        subject: decoded("subject"),
        from: Recipient::parse_list(&decoded("from")),
        to: Recipient::parse_list(&decoded("to")),
        date: headers.get("date").and_then(parse_date),
        message_id: headers
            .get("message-id")
            .map(|v| v.trim().to_string())
            .unwrap_or_default(),
        content_type: headers
            .get("content-type")
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .unwrap_or_else(|| "text/plain".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize() {
        let raw = b"From: =?UTF-8?B?Sm9zw6k=?= <jose@example.com>\r\n\
To: a@example.com, \"B, Bee\" <b@example.com>\r\n\
Subject: =?ISO-8859-1?Q?caf=E9?=\r\n\
Date: Thu, 04 Jan 2024 10:00:00 +0000\r\n\
Message-ID: <m1@example.com>\r\n\
Content-Type: Multipart/Mixed; boundary=x\r\n\
\r\n\
--x--\r\n";
        let summary = summarize(raw).unwrap();
        assert_eq!(summary.subject, "café");
        assert_eq!(summary.from[0].name, "José");
        assert_eq!(summary.to.len(), 2);
        assert_eq!(summary.to[1].name, "B, Bee");
        assert!(summary.date.is_some());
        assert_eq!(summary.message_id, "<m1@example.com>");
        assert_eq!(summary.content_type, "multipart/mixed");
    }

    #[test]
    fn test_summarize_rejects_garbage() {
        assert!(summarize(b"not a valid email").is_err());
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_eml("/definitely/not/here.eml").unwrap_err();
        assert!(matches!(err, SendriaError::FileNotFound(_)));
    }

    #[test]
    fn test_decompose_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.eml");
        std::fs::write(&path, "Subject: x\n\nhello\n").unwrap();
        let d = decompose_file(&path, &DecodeOptions::default()).unwrap();
        assert_eq!(d.parts[0].body, "hello\n");
    }
}
