//! Request descriptions for every Sendria endpoint the client uses.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Representations the server offers for a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// Metadata envelope (`.json`).
    Json,
    /// First plain-text part as served by the server (`.plain`).
    Plain,
    /// First HTML part as served by the server (`.html`).
    Html,
    /// Raw source as text (`.source`).
    Source,
    /// Raw source as a downloadable file (`.eml`).
    Eml,
}

impl MessageFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Plain => "plain",
            Self::Html => "html",
            Self::Source => "source",
            Self::Eml => "eml",
        }
    }
}

/// A method plus a server-relative path (query string included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
}

impl ApiRequest {
    /// `GET /api/messages/`, with `page`/`per_page` only when non-zero.
    pub fn list_messages(page: u32, per_page: u32) -> Self {
        let mut params = Vec::new();
        if page > 0 {
            params.push(format!("page={page}"));
        }
        if per_page > 0 {
            params.push(format!("per_page={per_page}"));
        }

        let mut path = "/api/messages/".to_string();
        if !params.is_empty() {
            path.push('?');
            path.push_str(&params.join("&"));
        }
        Self::get(path)
    }

    /// `GET /api/messages/{id}.{format}`.
    pub fn message(id: &str, format: MessageFormat) -> Self {
        Self::get(format!(
            "/api/messages/{}.{}",
            segment(id),
            format.extension()
        ))
    }

    /// `GET /api/messages/{id}/parts/{cid}`.
    pub fn attachment(id: &str, cid: &str) -> Self {
        Self::get(format!(
            "/api/messages/{}/parts/{}",
            segment(id),
            segment(cid)
        ))
    }

    /// `DELETE /api/messages/{id}`.
    pub fn delete_message(id: &str) -> Self {
        Self {
            method: Method::Delete,
            path: format!("/api/messages/{}", segment(id)),
        }
    }

    /// `DELETE /api/messages/`.
    pub fn delete_all() -> Self {
        Self {
            method: Method::Delete,
            path: "/api/messages/".to_string(),
        }
    }

    /// Absolute URL under `base_url`.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path)
    }

    fn get(path: String) -> Self {
        Self {
            method: Method::Get,
            path,
        }
    }
}

fn segment(s: &str) -> String {
    utf8_percent_encode(s, PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_messages_query() {
        assert_eq!(ApiRequest::list_messages(0, 0).path, "/api/messages/");
        assert_eq!(ApiRequest::list_messages(2, 0).path, "/api/messages/?page=2");
        assert_eq!(
            ApiRequest::list_messages(1, 50).path,
            "/api/messages/?page=1&per_page=50"
        );
    }

    #[test]
    fn test_message_formats() {
        assert_eq!(
            ApiRequest::message("12", MessageFormat::Json).path,
            "/api/messages/12.json"
        );
        assert_eq!(
            ApiRequest::message("12", MessageFormat::Eml).path,
            "/api/messages/12.eml"
        );
    }

    #[test]
    fn test_attachment_path_escapes_segments() {
        let req = ApiRequest::attachment("3", "img 1/a@b");
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/api/messages/3/parts/img%201%2Fa@b");
    }

    #[test]
    fn test_delete_requests() {
        assert_eq!(ApiRequest::delete_message("9").path, "/api/messages/9");
        assert_eq!(ApiRequest::delete_all().method, Method::Delete);
    }

    #[test]
    fn test_url_joins_base() {
        let req = ApiRequest::delete_all();
        assert_eq!(
            req.url("http://localhost:1080/"),
            "http://localhost:1080/api/messages/"
        );
    }
}
