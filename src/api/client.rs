//! Blocking client for the Sendria REST API.

use tracing::{debug, warn};

use super::request::{ApiRequest, MessageFormat, Method};
use super::wire;
use crate::error::{Result, SendriaError};
use crate::model::message::{Message, MessageList};

/// Where a Sendria server listens unless told otherwise.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1080";

const STATUS_OK: u16 = 200;
const STATUS_NO_CONTENT: u16 = 204;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiReply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Performs HTTP requests on behalf of a [`Client`].
///
/// Implementations own connection handling, timeouts and authentication.
/// Network failures should be reported as [`SendriaError::Transport`].
pub trait Transport {
    fn execute(&self, method: Method, url: &str) -> Result<ApiReply>;
}

impl<F> Transport for F
where
    F: Fn(Method, &str) -> Result<ApiReply>,
{
    fn execute(&self, method: Method, url: &str) -> Result<ApiReply> {
        self(method, url)
    }
}

/// Typed access to one Sendria server.
#[derive(Debug, Clone)]
pub struct Client<T> {
    base_url: String,
    transport: T,
}

impl<T: Transport> Client<T> {
    /// Create a client; an empty `base_url` means [`DEFAULT_BASE_URL`].
    pub fn new(base_url: impl Into<String>, transport: T) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url.trim().trim_end_matches('/').to_string()
        };
        Self {
            base_url,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One page of captured messages. Zero leaves `page`/`per_page` to the
    /// server's defaults.
    pub fn list_messages(&self, page: u32, per_page: u32) -> Result<MessageList> {
        let reply = self.send(&ApiRequest::list_messages(page, per_page), &[STATUS_OK])?;
        let list = wire::decode_message_list(&reply.body, page, per_page)?;
        debug!(
            count = list.messages.len(),
            total = list.total,
            page,
            "Listed messages"
        );
        Ok(list)
    }

    /// Metadata and raw source of one message. Parts and attachments are
    /// left empty; see [`Message::ensure_decomposed`].
    pub fn get_message(&self, id: &str) -> Result<Message> {
        let reply = self.send(&ApiRequest::message(id, MessageFormat::Json), &[STATUS_OK])?;
        wire::decode_message(&reply.body)
    }

    /// The server's rendering of the plain-text part.
    pub fn get_message_plain(&self, id: &str) -> Result<String> {
        self.get_text(id, MessageFormat::Plain)
    }

    /// The server's rendering of the HTML part.
    pub fn get_message_html(&self, id: &str) -> Result<String> {
        self.get_text(id, MessageFormat::Html)
    }

    pub fn get_message_source(&self, id: &str) -> Result<String> {
        self.get_text(id, MessageFormat::Source)
    }

    pub fn get_message_eml(&self, id: &str) -> Result<Vec<u8>> {
        let reply = self.send(&ApiRequest::message(id, MessageFormat::Eml), &[STATUS_OK])?;
        Ok(reply.body)
    }

    /// Download one attachment by Content-ID.
    pub fn get_attachment(&self, id: &str, cid: &str) -> Result<Vec<u8>> {
        let reply = self.send(&ApiRequest::attachment(id, cid), &[STATUS_OK])?;
        Ok(reply.body)
    }

    pub fn delete_message(&self, id: &str) -> Result<()> {
        self.send(
            &ApiRequest::delete_message(id),
            &[STATUS_OK, STATUS_NO_CONTENT],
        )?;
        Ok(())
    }

    pub fn delete_all_messages(&self) -> Result<()> {
        self.send(&ApiRequest::delete_all(), &[STATUS_OK, STATUS_NO_CONTENT])?;
        Ok(())
    }

    fn get_text(&self, id: &str, format: MessageFormat) -> Result<String> {
        let reply = self.send(&ApiRequest::message(id, format), &[STATUS_OK])?;
        Ok(match String::from_utf8(reply.body) {
            Ok(text) => text,
            Err(e) => {
                warn!(id, ?format, "Response body is not valid UTF-8");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        })
    }

    fn send(&self, request: &ApiRequest, accepted: &[u16]) -> Result<ApiReply> {
        let url = request.url(&self.base_url);
        debug!(method = %request.method, url = %url, "Sendria request");

        let reply = self.transport.execute(request.method, &url)?;
        if !accepted.contains(&reply.status) {
            debug!(status = reply.status, url = %url, "Rejected response status");
            return Err(SendriaError::UnexpectedStatus(reply.status));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Replays canned replies and records every request.
    struct Scripted {
        replies: RefCell<Vec<ApiReply>>,
        seen: RefCell<Vec<(Method, String)>>,
    }

    impl Scripted {
        fn new(replies: Vec<ApiReply>) -> Self {
            Self {
                replies: RefCell::new(replies),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for Scripted {
        fn execute(&self, method: Method, url: &str) -> Result<ApiReply> {
            self.seen.borrow_mut().push((method, url.to_string()));
            let mut replies = self.replies.borrow_mut();
            if replies.is_empty() {
                return Err(SendriaError::Transport("no scripted reply".into()));
            }
            Ok(replies.remove(0))
        }
    }

    #[test]
    fn test_default_base_url() {
        let client = Client::new("", Scripted::new(vec![]));
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);

        let client = Client::new("http://mail:1080/", Scripted::new(vec![]));
        assert_eq!(client.base_url(), "http://mail:1080");
    }

    #[test]
    fn test_list_messages_request_and_decode() {
        let body = r#"{"code":"OK","data":[{"id":5,"subject":"Hi"}],"meta":{"pages_total":2}}"#;
        let client = Client::new("http://h", Scripted::new(vec![ApiReply::new(200, body)]));
        let list = client.list_messages(1, 10).unwrap();

        assert_eq!(list.messages[0].id, "5");
        assert_eq!(list.total, 20);
        let seen = client.transport().seen.borrow();
        assert_eq!(
            seen[0],
            (Method::Get, "http://h/api/messages/?page=1&per_page=10".to_string())
        );
    }

    #[test]
    fn test_unexpected_status() {
        let client = Client::new("http://h", Scripted::new(vec![ApiReply::new(404, "")]));
        let err = client.get_message("9").unwrap_err();
        assert!(matches!(err, SendriaError::UnexpectedStatus(404)));
    }

    #[test]
    fn test_delete_accepts_no_content() {
        let client = Client::new(
            "http://h",
            Scripted::new(vec![ApiReply::new(204, ""), ApiReply::new(200, "{}")]),
        );
        client.delete_message("3").unwrap();
        client.delete_all_messages().unwrap();

        let seen = client.transport().seen.borrow();
        assert_eq!(seen[0], (Method::Delete, "http://h/api/messages/3".to_string()));
        assert_eq!(seen[1], (Method::Delete, "http://h/api/messages/".to_string()));
    }

    #[test]
    fn test_get_does_not_accept_no_content() {
        let client = Client::new("http://h", Scripted::new(vec![ApiReply::new(204, "")]));
        assert!(matches!(
            client.get_message_plain("1"),
            Err(SendriaError::UnexpectedStatus(204))
        ));
    }

    #[test]
    fn test_text_formats_are_lossy() {
        let client = Client::new(
            "http://h",
            Scripted::new(vec![ApiReply::new(200, b"caf\xe9".to_vec())]),
        );
        assert_eq!(client.get_message_html("1").unwrap(), "caf\u{FFFD}");
    }

    #[test]
    fn test_binary_endpoints_return_raw_bytes() {
        let client = Client::new(
            "http://h",
            Scripted::new(vec![
                ApiReply::new(200, vec![0x89, b'P', b'N', b'G']),
                ApiReply::new(200, "Subject: x\r\n\r\nbody"),
            ]),
        );
        assert_eq!(client.get_attachment("1", "img@x").unwrap(), vec![0x89, b'P', b'N', b'G']);
        assert!(client.get_message_eml("1").unwrap().starts_with(b"Subject"));
        let seen = client.transport().seen.borrow();
        assert_eq!(seen[0].1, "http://h/api/messages/1/parts/img@x");
        assert_eq!(seen[1].1, "http://h/api/messages/1.eml");
    }

    #[test]
    fn test_transport_errors_propagate() {
        let client = Client::new("http://h", |_: Method, _: &str| -> Result<ApiReply> {
            Err(SendriaError::Transport("connection refused".into()))
        });
        assert!(matches!(
            client.get_message_source("1"),
            Err(SendriaError::Transport(_))
        ));
    }
}
