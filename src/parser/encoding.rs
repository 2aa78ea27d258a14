//! Content-Transfer-Encoding reversal (RFC 2045 §6).
//!
//! Decoding never fails from the caller's point of view: a body that does
//! not decode under its declared encoding is returned as the raw bytes.

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, warn};

/// A transfer encoding as declared by a `Content-Transfer-Encoding` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    Base64,
    QuotedPrintable,
    /// `7bit`, `8bit`, `binary`, unknown values, or no header at all.
    Identity,
}

impl TransferEncoding {
    /// Interpret a header value, case-insensitively.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Identity;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "" | "7bit" | "8bit" | "binary" => Self::Identity,
            other => {
                debug!(encoding = other, "Unknown transfer encoding, keeping raw bytes");
                Self::Identity
            }
        }
    }
}

/// Why a body could not be decoded under its declared encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DecodeFailure {
    Base64(String),
    QuotedPrintable { offset: usize },
}

impl std::fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base64(reason) => write!(f, "invalid base64: {reason}"),
            Self::QuotedPrintable { offset } => {
                write!(f, "invalid quoted-printable escape at byte {offset}")
            }
        }
    }
}

/// Reverse `encoding`, falling back to `content` unchanged on failure.
pub fn decode_body(content: &[u8], encoding: TransferEncoding) -> Cow<'_, [u8]> {
    match try_decode(content, encoding) {
        Ok(decoded) => decoded,
        Err(failure) => {
            warn!(?encoding, %failure, "Transfer decoding failed, keeping raw bytes");
            Cow::Borrowed(content)
        }
    }
}

pub(crate) fn try_decode(
    content: &[u8],
    encoding: TransferEncoding,
) -> Result<Cow<'_, [u8]>, DecodeFailure> {
    match encoding {
        TransferEncoding::Identity => Ok(Cow::Borrowed(content)),
        TransferEncoding::Base64 => decode_base64(content).map(Cow::Owned),
        TransferEncoding::QuotedPrintable => decode_quoted_printable(content).map(Cow::Owned),
    }
}

/// Standard padded alphabet. Line breaks are skipped; any other stray byte,
/// spaces included, is a failure.
fn decode_base64(content: &[u8]) -> Result<Vec<u8>, DecodeFailure> {
    let compact: Vec<u8> = content
        .iter()
        .copied()
        .filter(|b| !matches!(b, b'\r' | b'\n'))
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| DecodeFailure::Base64(e.to_string()))
}

/// Decode quoted-printable.
///
/// Trailing whitespace on each line is dropped, `=` at end of line is a soft
/// break, and hard line breaks keep their original CRLF or LF form. An `=`
/// not followed by two hex digits is an error.
fn decode_quoted_printable(content: &[u8]) -> Result<Vec<u8>, DecodeFailure> {
    let mut out = Vec::with_capacity(content.len());
    let mut offset = 0;
    let mut lines = content.split(|&b| b == b'\n').peekable();

    while let Some(raw_line) = lines.next() {
        let has_lf = lines.peek().is_some();
        let has_cr = has_lf && raw_line.ends_with(b"\r");
        let line = trim_end_lwsp(raw_line);

        let mut soft_break = false;
        let mut i = 0;
        while i < line.len() {
            if line[i] != b'=' {
                out.push(line[i]);
                i += 1;
                continue;
            }
            if i + 1 == line.len() {
                soft_break = true;
                break;
            }
            match (line.get(i + 1).and_then(hex), line.get(i + 2).and_then(hex)) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 3;
                }
                _ => return Err(DecodeFailure::QuotedPrintable { offset: offset + i }),
            }
        }

        if has_lf && !soft_break {
            if has_cr {
                out.push(b'\r');
            }
            out.push(b'\n');
        }
        offset += raw_line.len() + 1;
    }

    Ok(out)
}

fn trim_end_lwsp(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !matches!(b, b' ' | b'\t' | b'\r'))
        .map_or(0, |p| p + 1);
    &line[..end]
}

fn hex(b: &u8) -> Option<u8> {
    (*b as char).to_digit(16).map(|d| d as u8)
}
