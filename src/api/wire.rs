//! JSON shapes of the Sendria REST API and their conversion into [`Message`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Result, SendriaError};
use crate::model::message::{Message, MessageList};
use crate::model::recipient::Recipient;

/// Formats Sendria has been seen to use for `created_at`, tried in order
/// after RFC 3339.
const CREATED_AT_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Standard response envelope: `{"code": "OK", "data": ..., "meta": ...}`.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
    pub code: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub meta: Option<ApiMeta>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ApiMeta {
    #[serde(default)]
    pub pages_total: u64,
}

/// A message exactly as the server serializes it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiMessage {
    pub id: i64,
    pub sender_envelope: String,
    pub sender_message: String,
    pub recipients_envelope: Option<Vec<String>>,
    pub recipients_message_to: Option<Vec<String>>,
    pub recipients_message_cc: Option<Vec<String>>,
    pub recipients_message_bcc: Option<Vec<String>>,
    pub subject: String,
    pub source: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub peer: String,
    pub created_at: String,
}

impl From<ApiMessage> for Message {
    fn from(api: ApiMessage) -> Self {
        let sender = if api.sender_message.trim().is_empty() {
            &api.sender_envelope
        } else {
            &api.sender_message
        };

        Message {
            id: api.id.to_string(),
            subject: api.subject,
            to: api
                .recipients_message_to
                .unwrap_or_default()
                .iter()
                .map(|r| Recipient::parse(r))
                .collect(),
            from: vec![Recipient::parse(sender)],
            created_at: parse_created_at(&api.created_at),
            size: usize::try_from(api.size).unwrap_or(0),
            kind: api.kind,
            source: api.source,
            parts: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

/// Parse a server timestamp. Unparseable values map to the Unix epoch.
pub fn parse_created_at(raw: &str) -> DateTime<Utc> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    CREATED_AT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}

/// Unwrap the envelope, rejecting any code other than `OK`.
pub fn open_envelope(body: &[u8]) -> Result<ApiEnvelope> {
    let envelope: ApiEnvelope = serde_json::from_slice(body)?;
    if envelope.code != "OK" {
        return Err(SendriaError::Api(envelope.code));
    }
    Ok(envelope)
}

fn data_as<D: DeserializeOwned>(data: serde_json::Value) -> Result<D> {
    Ok(serde_json::from_value(data)?)
}

/// Decode the body of `GET /api/messages/{id}.json`.
pub fn decode_message(body: &[u8]) -> Result<Message> {
    let envelope = open_envelope(body)?;
    let api: ApiMessage = data_as(envelope.data)?;
    Ok(api.into())
}

/// Decode the body of `GET /api/messages/`.
///
/// `total` is only an estimate (`pages_total * per_page`) when the server
/// sends pagination metadata; otherwise it counts the returned messages.
pub fn decode_message_list(body: &[u8], page: u32, per_page: u32) -> Result<MessageList> {
    let envelope = open_envelope(body)?;
    let api: Option<Vec<ApiMessage>> = data_as(envelope.data)?;
    let messages: Vec<Message> = api.unwrap_or_default().into_iter().map(Message::from).collect();

    let total = match envelope.meta {
        Some(meta) if per_page > 0 => {
            usize::try_from(meta.pages_total.saturating_mul(u64::from(per_page)))
                .unwrap_or(usize::MAX)
        }
        _ => messages.len(),
    };

    Ok(MessageList {
        messages,
        total,
        page,
        per_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const ONE: &str = r#"{
        "code": "OK",
        "data": {
            "id": 42,
            "sender_envelope": "bounce@example.com",
            "sender_message": "Alice <alice@example.com>",
            "recipients_envelope": ["bob@example.com"],
            "recipients_message_to": ["Bob <bob@example.com>", "carol@example.com"],
            "recipients_message_cc": null,
            "recipients_message_bcc": [],
            "subject": "Hello",
            "source": "Subject: Hello\r\n\r\nhi\r\n",
            "size": 23,
            "type": "text/plain",
            "peer": "127.0.0.1:5000",
            "created_at": "2024-01-15T10:30:00.250000"
        }
    }"#;

    #[test]
    fn test_decode_message() {
        let msg = decode_message(ONE.as_bytes()).unwrap();
        assert_eq!(msg.id, "42");
        assert_eq!(msg.subject, "Hello");
        assert_eq!(msg.from, vec![Recipient::parse("Alice <alice@example.com>")]);
        assert_eq!(msg.to.len(), 2);
        assert_eq!(msg.to[0].name, "Bob");
        assert_eq!(msg.to[1].email, "carol@example.com");
        assert_eq!(msg.size, 23);
        assert_eq!(msg.kind, "text/plain");
        assert_eq!(msg.created_at.year(), 2024);
        assert_eq!(msg.created_at.minute(), 30);
        assert!(msg.parts.is_empty());
    }

    #[test]
    fn test_sender_falls_back_to_envelope() {
        let api = ApiMessage {
            sender_envelope: "env@example.com".into(),
            ..Default::default()
        };
        let msg = Message::from(api);
        assert_eq!(msg.from, vec![Recipient::new("env@example.com")]);
    }

    #[test]
    fn test_api_error_code() {
        let err = decode_message(br#"{"code": "NOT_FOUND", "data": null}"#).unwrap_err();
        assert!(matches!(err, SendriaError::Api(code) if code == "NOT_FOUND"));
    }

    #[test]
    fn test_bad_json() {
        let err = decode_message(b"<html>").unwrap_err();
        assert!(matches!(err, SendriaError::Json(_)));
    }

    #[test]
    fn test_created_at_variants() {
        assert_eq!(parse_created_at("2024-01-15T10:30:00").hour(), 10);
        assert_eq!(parse_created_at("2024-01-15T10:30:00+02:00").hour(), 8);
        assert_eq!(parse_created_at("2024-01-15 10:30:00").day(), 15);
        assert_eq!(parse_created_at("yesterday").timestamp(), 0);
        assert_eq!(parse_created_at("").timestamp(), 0);
    }

    #[test]
    fn test_list_total_from_meta() {
        let body = r#"{"code":"OK","data":[{"id":1},{"id":2}],"meta":{"pages_total":3}}"#;
        let list = decode_message_list(body.as_bytes(), 1, 2).unwrap();
        assert_eq!(list.messages.len(), 2);
        assert_eq!(list.total, 6);
        assert_eq!(list.page, 1);
        assert_eq!(list.per_page, 2);
    }

    #[test]
    fn test_list_total_without_meta() {
        let body = r#"{"code":"OK","data":[{"id":1},{"id":2}]}"#;
        let list = decode_message_list(body.as_bytes(), 0, 0).unwrap();
        assert_eq!(list.total, 2);

        let body = r#"{"code":"OK","data":[{"id":1}],"meta":{"pages_total":4}}"#;
        let list = decode_message_list(body.as_bytes(), 0, 0).unwrap();
        assert_eq!(list.total, 1);
    }

    #[test]
    fn test_list_null_data() {
        let list = decode_message_list(br#"{"code":"OK","data":null}"#, 0, 0).unwrap();
        assert!(list.messages.is_empty());
        assert_eq!(list.total, 0);
    }
}
