//! MIME decomposition: frame a raw message, unwrap nested multiparts, decode
//! every leaf and sort it into content parts or attachments.
//!
//! Only a message that cannot be framed at all is an error. Everything below
//! the top-level header block degrades instead: unparseable Content-Type
//! values become `text/plain`, bodies that fail transfer decoding are kept
//! raw, and a missing close delimiter simply ends the multipart.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SendriaError};
use crate::model::part::{Attachment, ContentPart, Decomposition};
use crate::parser::encoding::{decode_body, TransferEncoding};
use crate::parser::header::{decode_encoded_words, HeaderMap, MediaType};

/// Maximum number of nested multipart levels accepted by default.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Knobs for [`decompose_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Deeper multipart nesting fails with `MalformedMessage`. Zero is
    /// treated as one, so the top-level multipart is always accepted.
    pub max_depth: usize,
    /// Classify a top-level single-part body like a multipart leaf, so a
    /// top-level `Content-Disposition: attachment` yields an attachment.
    /// When `false` such a body is always a content part.
    pub classify_single_part: bool,
}

impl DecodeOptions {
    pub(crate) fn depth_limit(&self) -> usize {
        self.max_depth.max(1)
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            classify_single_part: false,
        }
    }
}

/// Decompose `raw` with default options.
pub fn decompose(raw: &str) -> Result<Decomposition> {
    decompose_bytes(raw.as_bytes(), &DecodeOptions::default())
}

/// Decompose `raw` with explicit options.
pub fn decompose_with(raw: &str, options: &DecodeOptions) -> Result<Decomposition> {
    decompose_bytes(raw.as_bytes(), options)
}

/// Decompose a raw message given as bytes.
pub fn decompose_bytes(raw: &[u8], options: &DecodeOptions) -> Result<Decomposition> {
    let (headers, body) = frame_message(raw)?;
    let mut walker = Walker {
        options,
        out: Decomposition::default(),
    };

    match content_type(&headers) {
        None => {
            let body = String::from_utf8_lossy(body).into_owned();
            walker.out.parts.push(ContentPart::new(
                "text/plain".to_string(),
                "text/plain".to_string(),
                body,
            ));
        }
        Some(raw_type) => {
            let media = parse_content_type(raw_type);
            let boundary = media
                .boundary()
                .filter(|_| media.is_multipart())
                .map(str::to_string);
            match boundary {
                Some(boundary) => walker.walk_multipart(body, &boundary, 1)?,
                None if options.classify_single_part => {
                    walker.push_leaf(&headers, body, media, raw_type);
                }
                None => {
                    let encoding =
                        TransferEncoding::from_header(headers.get("content-transfer-encoding"));
                    let decoded = decode_body(body, encoding);
                    walker.out.parts.push(ContentPart::new(
                        media.essence,
                        raw_type.to_string(),
                        String::from_utf8_lossy(&decoded).into_owned(),
                    ));
                }
            }
        }
    }

    debug!(
        parts = walker.out.parts.len(),
        attachments = walker.out.attachments.len(),
        "Decomposed message"
    );
    Ok(walker.out)
}

struct Walker<'o> {
    options: &'o DecodeOptions,
    out: Decomposition,
}

impl Walker<'_> {
    fn walk_multipart(&mut self, body: &[u8], boundary: &str, depth: usize) -> Result<()> {
        let limit = self.options.depth_limit();
        if depth > limit {
            return Err(SendriaError::malformed(format!(
                "multipart nesting deeper than {limit} levels"
            )));
        }

        for section in split_multipart(body, boundary) {
            let (headers, content) = frame_part(section);
            let raw_type = content_type(&headers).unwrap_or("text/plain");
            let media = parse_content_type(raw_type);

            if media.is_multipart() {
                if let Some(nested) = media.boundary() {
                    self.walk_multipart(content, nested, depth + 1)?;
                    continue;
                }
            }

            self.push_leaf(&headers, content, media, raw_type);
        }
        Ok(())
    }

    fn push_leaf(
        &mut self,
        headers: &HeaderMap,
        content: &[u8],
        media: MediaType,
        raw_type: &str,
    ) {
        let encoding = TransferEncoding::from_header(headers.get("content-transfer-encoding"));
        let decoded = decode_body(content, encoding);

        let disposition = headers.get("content-disposition");
        let filename = leaf_filename(disposition, &media);
        let is_attachment =
            disposition.is_some_and(is_attachment_disposition) || !filename.is_empty();

        if is_attachment {
            let content_id = headers
                .get("content-id")
                .map(|v| v.trim().trim_matches(|c| c == '<' || c == '>').to_string())
                .unwrap_or_default();
            let content = decoded.into_owned();
            self.out.attachments.push(Attachment {
                content_id,
                media_type: media.essence,
                filename,
                raw_content_type: raw_type.to_string(),
                size: content.len(),
                content,
            });
        } else {
            self.out.parts.push(ContentPart::new(
                media.essence,
                raw_type.to_string(),
                String::from_utf8_lossy(&decoded).into_owned(),
            ));
        }
    }
}

/// A blank `Content-Type:` counts as absent.
fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("content-type")
        .filter(|value| !value.trim().is_empty())
}

fn parse_content_type(raw_type: &str) -> MediaType {
    MediaType::parse(raw_type).unwrap_or_else(|| {
        warn!(content_type = raw_type, "Unparseable Content-Type, assuming text/plain");
        MediaType::text_plain()
    })
}

fn is_attachment_disposition(value: &str) -> bool {
    value
        .trim_start()
        .get(..10)
        .is_some_and(|head| head.eq_ignore_ascii_case("attachment"))
}

/// Disposition `filename`, else Content-Type `name`; decoded and reduced to a basename.
fn leaf_filename(disposition: Option<&str>, media: &MediaType) -> String {
    let from_disposition = disposition
        .and_then(MediaType::parse)
        .and_then(|d| d.params.get("filename").cloned());
    let raw = from_disposition
        .or_else(|| media.param("name").map(str::to_string))
        .unwrap_or_default();

    let decoded = decode_encoded_words(raw.trim());
    decoded
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string()
}

// ── Framing ─────────────────────────────────────────────────────

/// Split the top-level message into headers and body.
///
/// A BOM and an mbox `From ` line are skipped. Headers must be well formed;
/// a message with headers and no body is accepted.
pub(crate) fn frame_message(raw: &[u8]) -> Result<(HeaderMap, &[u8])> {
    let data = skip_from_line(raw);
    if data.is_empty() {
        return Err(SendriaError::malformed("empty message"));
    }

    let (header_bytes, body) = split_entity(data);
    let headers = HeaderMap::parse_strict(header_bytes).map_err(SendriaError::MalformedMessage)?;
    if body.is_none() && headers.is_empty() {
        return Err(SendriaError::malformed("no header section"));
    }
    Ok((headers, body.unwrap_or_default()))
}

/// Split one multipart section into headers and content.
///
/// A section with no blank line is all headers if every line parses as one,
/// otherwise it is a headerless body.
fn frame_part(section: &[u8]) -> (HeaderMap, &[u8]) {
    match split_entity(section) {
        (header_bytes, Some(body)) => (HeaderMap::parse(header_bytes), body),
        (_, None) => match HeaderMap::parse_strict(section) {
            Ok(headers) if !headers.is_empty() => (headers, &section[..0]),
            _ => (HeaderMap::default(), section),
        },
    }
}

/// Split at the first empty line (LF or CRLF). The body is `None` when no
/// empty line exists.
fn split_entity(data: &[u8]) -> (&[u8], Option<&[u8]>) {
    let mut pos = 0;
    while let Some(nl) = data[pos..].iter().position(|&b| b == b'\n') {
        let line = &data[pos..pos + nl];
        if line.is_empty() || line == b"\r" {
            return (&data[..pos], Some(&data[pos + nl + 1..]));
        }
        pos += nl + 1;
    }
    (data, None)
}

/// Skip a UTF-8 BOM and the `From ` separator line at the start of mbox messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[derive(Debug, PartialEq, Eq)]
enum Delimiter {
    Part,
    Close,
}

/// Classify a line (without its line break) against `--boundary`.
fn delimiter(line: &[u8], dash_boundary: &[u8]) -> Option<Delimiter> {
    let rest = line.strip_prefix(dash_boundary)?;
    let (kind, rest) = match rest.strip_prefix(b"--") {
        Some(after) => (Delimiter::Close, after),
        None => (Delimiter::Part, rest),
    };
    rest.iter()
        .all(|b| matches!(b, b' ' | b'\t' | b'\r'))
        .then_some(kind)
}

/// Cut a multipart body into its sections, preamble and epilogue dropped.
///
/// The line break before each delimiter belongs to the delimiter. Without a
/// close delimiter the last section runs to the end of the input.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let dash_boundary = format!("--{boundary}").into_bytes();
    let mut sections = Vec::new();
    let mut current: Option<usize> = None;
    let mut pos = 0;

    loop {
        let nl = body[pos..].iter().position(|&b| b == b'\n');
        let line_end = nl.map_or(body.len(), |i| pos + i);
        let next = nl.map_or(body.len(), |i| pos + i + 1);

        if let Some(kind) = delimiter(&body[pos..line_end], &dash_boundary) {
            if let Some(start) = current.take() {
                sections.push(&body[start..content_end(body, start, pos)]);
            }
            if kind == Delimiter::Close {
                return sections;
            }
            current = Some(next);
        }

        if nl.is_none() {
            break;
        }
        pos = next;
    }

    if let Some(start) = current {
        let tail = &body[start..];
        if !tail.iter().all(u8::is_ascii_whitespace) {
            debug!(boundary, "Multipart body has no close delimiter");
            sections.push(tail);
        }
    }
    sections
}

/// End of a section whose delimiter line starts at `delim`: drop the CRLF or
/// LF that precedes it.
fn content_end(body: &[u8], start: usize, delim: usize) -> usize {
    let mut end = delim;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}
