//! Integration tests for the REST client, the caching store and the test
//! harness, run against an in-memory stand-in for a Sendria server.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_fs::prelude::*;
use predicates::prelude::*;

use sendria::api::{ApiReply, Client, Method, Transport};
use sendria::error::{Result, SendriaError};
use sendria::export::attachment::export_message_attachments;
use sendria::harness::Mailbox;
use sendria::parser::mime::{self, DecodeOptions};
use sendria::store::MessageStore;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture(name)).unwrap()
}

/// Captured messages kept in memory, served over the Sendria URL scheme.
#[derive(Default)]
struct FakeSendria {
    messages: RefCell<Vec<(u32, String, String)>>,
    next_id: Cell<u32>,
    requests: Cell<usize>,
}

impl FakeSendria {
    fn deliver(&self, to: &str, source: &str) {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        // Newest first, like the real server.
        self.messages
            .borrow_mut()
            .insert(0, (id, to.to_string(), source.to_string()));
    }

    fn api_message(id: u32, to: &str, source: &str) -> serde_json::Value {
        let subject = sendria::parser::eml::summarize(source.as_bytes())
            .map(|s| s.subject)
            .unwrap_or_default();
        serde_json::json!({
            "id": id,
            "sender_envelope": "sender@example.com",
            "sender_message": "sender@example.com",
            "recipients_message_to": [to],
            "subject": subject,
            "source": source,
            "size": source.len(),
            "type": "text/plain",
            "created_at": "2024-01-17T12:00:00",
        })
    }

    fn ok(data: serde_json::Value) -> ApiReply {
        ApiReply::new(200, serde_json::json!({"code": "OK", "data": data}).to_string())
    }
}

impl Transport for FakeSendria {
    fn execute(&self, method: Method, url: &str) -> Result<ApiReply> {
        self.requests.set(self.requests.get() + 1);
        let path = url
            .strip_prefix("http://sendria.test/api/messages/")
            .ok_or_else(|| SendriaError::Transport(format!("unroutable {url}")))?;

        if method == Method::Delete {
            let mut messages = self.messages.borrow_mut();
            if path.is_empty() {
                messages.clear();
            } else {
                messages.retain(|(id, _, _)| id.to_string() != path);
            }
            return Ok(ApiReply::new(204, ""));
        }

        let messages = self.messages.borrow();
        if path.is_empty() || path.starts_with('?') {
            let data = messages
                .iter()
                .map(|(id, to, src)| Self::api_message(*id, to, src))
                .collect();
            return Ok(Self::ok(serde_json::Value::Array(data)));
        }

        let (id, format) = path.split_once('.').unwrap_or((path, ""));
        let Some((id, to, source)) = messages.iter().find(|(mid, _, _)| mid.to_string() == id)
        else {
            return Ok(ApiReply::new(404, ""));
        };
        match format {
            "json" => Ok(Self::ok(Self::api_message(*id, to, source))),
            "source" | "eml" => Ok(ApiReply::new(200, source.clone())),
            "plain" => {
                let d = mime::decompose(source)?;
                let body = d.part_of_type("text/plain").map(|p| p.body.clone());
                Ok(ApiReply::new(200, body.unwrap_or_default()))
            }
            _ => Ok(ApiReply::new(404, "")),
        }
    }
}

fn client() -> Client<FakeSendria> {
    Client::new("http://sendria.test/", FakeSendria::default())
}

fn mailbox() -> Mailbox<FakeSendria> {
    Mailbox::new(client())
        .with_poll_interval(Duration::from_millis(1))
        .with_timeout(Duration::from_millis(200))
}

// ─── Client ─────────────────────────────────────────────────────────

#[test]
fn test_client_lists_and_fetches() {
    let client = client();
    client
        .transport()
        .deliver("bob@example.com", &read_fixture("simple.eml"));
    client
        .transport()
        .deliver("customer@example.com", &read_fixture("alternative.eml"));

    let list = client.list_messages(1, 10).unwrap();
    assert_eq!(list.total, 2);
    assert_eq!(list.messages[0].id, "2");
    assert_eq!(list.messages[1].subject, "Lunch?");

    let mut msg = client.get_message("2").unwrap();
    msg.ensure_decomposed(&DecodeOptions::default()).unwrap();
    assert_eq!(msg.html(), Some("<p>Your order <b>#1042</b> is on its way.</p>"));
    assert!(msg.is_addressed_to("customer@example.com"));

    assert!(client.get_message_eml("1").unwrap().starts_with(b"From: Alice"));
    assert!(matches!(
        client.get_message("99"),
        Err(SendriaError::UnexpectedStatus(404))
    ));
}

#[test]
fn test_inspect_saved_api_response() {
    let body = std::fs::read(fixture("sendria-message.json")).unwrap();
    let mut msg = sendria::api::wire::decode_message(&body).unwrap();
    msg.ensure_decomposed(&DecodeOptions::default()).unwrap();

    assert_eq!(msg.id, "17");
    assert_eq!(msg.to[0].name, "Bob");
    assert_eq!(msg.plain_text(), Some("Please find your invoice attached."));
    assert!(msg.attachment_by_filename("facture-été.pdf").is_some());
    assert_eq!(msg.created_at.to_rfc3339(), "2024-01-17T12:00:01.123456+00:00");
}

// ─── Store ──────────────────────────────────────────────────────────

#[test]
fn test_store_serves_attachments_from_one_download() {
    let client = client();
    client
        .transport()
        .deliver("bob@example.com", &read_fixture("nested.eml"));
    let mut store = MessageStore::new(client, DecodeOptions::default(), 8);

    let logo = store.get_attachment("1", "logo@example.com").unwrap().to_vec();
    assert!(logo.starts_with(b"\x89PNG"));
    let again = store.get_attachment("1", "<logo@example.com>").unwrap();
    assert_eq!(again, logo.as_slice());
    assert_eq!(store.client().transport().requests.get(), 1);

    assert!(matches!(
        store.get_attachment("1", "missing@example.com"),
        Err(SendriaError::AttachmentNotFound { .. })
    ));
}

#[test]
fn test_export_message_attachments() {
    let client = client();
    client
        .transport()
        .deliver("bob@example.com", &read_fixture("nested.eml"));
    let mut store = MessageStore::new(client, DecodeOptions::default(), 8);
    let out = assert_fs::TempDir::new().unwrap();

    let paths = export_message_attachments(&mut store, "1", out.path()).unwrap();
    assert_eq!(paths.len(), 2);

    let folder = out.child("20240117_120000_1_Invoice_2024-01");
    folder.assert(predicate::path::is_dir());
    folder.child("logo.png").assert(predicate::path::is_file());
    folder
        .child("facture-été.pdf")
        .assert("%PDF-1.4\n% fake invoice\n");
}

// ─── Harness ────────────────────────────────────────────────────────

#[test]
fn test_harness_flow() {
    let mb = mailbox();
    mb.client()
        .transport()
        .deliver("stale@example.com", &read_fixture("simple.eml"));
    mb.clear().unwrap();
    mb.assert_count(0).unwrap();

    mb.client()
        .transport()
        .deliver("customer@example.com", &read_fixture("alternative.eml"));

    let msg = mb
        .wait_for_email("customer@example.com", "Your order has shipped 📦")
        .unwrap();
    mb.assert_content(&msg, &["#1042", "Track it"]).unwrap();
    mb.assert_count(1).unwrap();
    assert_eq!(mb.latest().unwrap().id, msg.id);
}

#[test]
fn test_harness_timeout_reports_seen_messages() {
    let mb = mailbox();
    mb.client()
        .transport()
        .deliver("bob@example.com", &read_fixture("simple.eml"));

    let err = mb.wait_for_recipient("nobody@example.com").unwrap_err();
    match err {
        SendriaError::Timeout { seen, ref what, .. } => {
            assert_eq!(seen, 1);
            assert!(what.contains("nobody@example.com"));
        }
        other => panic!("expected timeout, got {other}"),
    }
}
