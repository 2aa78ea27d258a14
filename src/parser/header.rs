//! RFC 5322 header handling: unfolding, media-type parameters (RFC 2045/2231),
//! encoded-words (RFC 2047), and date parsing.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use percent_encoding::percent_decode_str;
use tracing::warn;

/// Unfolded header fields of one entity, in source order.
///
/// Names are stored lower-cased; lookups are case-insensitive and return
/// the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    fields: Vec<(String, String)>,
}

impl HeaderMap {
    /// Parse a header block leniently: malformed lines are skipped.
    pub fn parse(raw: &[u8]) -> Self {
        let text = decode_header_bytes(raw);
        let mut fields: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            if is_continuation(line) {
                if let Some(last) = fields.last_mut() {
                    append_folded(&mut last.1, line);
                }
            } else if let Some(field) = split_field(line) {
                fields.push(field);
            }
            // Anything else is junk and silently dropped
        }

        Self { fields }
    }

    /// Parse a header block, rejecting any line that is neither a field nor
    /// a continuation of one.
    pub fn parse_strict(raw: &[u8]) -> Result<Self, String> {
        let text = decode_header_bytes(raw);
        let mut fields: Vec<(String, String)> = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            if is_continuation(line) {
                match fields.last_mut() {
                    Some(last) => append_folded(&mut last.1, line),
                    None => return Err("header block starts with a continuation line".into()),
                }
            } else {
                let field = split_field(line)
                    .ok_or_else(|| format!("malformed header line {}: {:?}", idx + 1, line))?;
                fields.push(field);
            }
        }

        Ok(Self { fields })
    }

    /// First value of the named field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate `(lower-cased name, value)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

fn append_folded(value: &mut String, line: &str) {
    if !value.is_empty() {
        value.push(' ');
    }
    value.push_str(line.trim());
}

/// Split `Name: value`. The name must be non-empty printable ASCII without
/// spaces or colons.
fn split_field(line: &str) -> Option<(String, String)> {
    let colon = line.find(':')?;
    let name = &line[..colon];
    if name.is_empty() || !name.bytes().all(|b| (33..=126).contains(&b)) {
        return None;
    }
    Some((name.to_ascii_lowercase(), line[colon + 1..].trim().to_string()))
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

// ── Media types ─────────────────────────────────────────────────

/// A parsed `Content-Type` (or `Content-Disposition`) value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Lower-cased `type/subtype`, or a bare token for dispositions.
    pub essence: String,
    /// Lower-cased parameter names with RFC 2231 continuations reassembled.
    pub params: BTreeMap<String, String>,
}

impl MediaType {
    /// The `text/plain` type assumed for entities without a usable Content-Type.
    pub fn text_plain() -> Self {
        Self {
            essence: "text/plain".to_string(),
            params: BTreeMap::new(),
        }
    }

    /// Parse a header value such as `text/plain; charset="utf-8"`.
    ///
    /// Returns `None` for an invalid type token, a malformed parameter list
    /// or a duplicated parameter.
    pub fn parse(value: &str) -> Option<Self> {
        let (base, rest) = match value.find(';') {
            Some(i) => (&value[..i], &value[i..]),
            None => (value, ""),
        };
        let essence = parse_essence(base.trim())?;
        let params = parse_params(rest)?;
        Some(Self { essence, params })
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn is_multipart(&self) -> bool {
        self.essence.starts_with("multipart/")
    }

    /// The non-empty `boundary` parameter.
    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary").filter(|b| !b.is_empty())
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii() && !c.is_ascii_control() && c != ' ' && !"()<>@,;:\\\"/[]?=".contains(c)
}

fn take_token(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_token_char(c)).unwrap_or(s.len());
    (&s[..end], &s[end..])
}

fn parse_essence(base: &str) -> Option<String> {
    let (main, rest) = take_token(base);
    if main.is_empty() {
        return None;
    }
    if rest.is_empty() {
        return Some(main.to_ascii_lowercase());
    }
    let (sub, rest) = take_token(rest.strip_prefix('/')?);
    if sub.is_empty() || !rest.trim().is_empty() {
        return None;
    }
    Some(format!("{main}/{sub}").to_ascii_lowercase())
}

/// Parse `; key=value` pairs. Values are tokens or quoted strings.
fn parse_params(mut s: &str) -> Option<BTreeMap<String, String>> {
    let mut simple: BTreeMap<String, String> = BTreeMap::new();
    let mut extended: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    loop {
        s = s.trim_start();
        if s.is_empty() {
            break;
        }
        s = s.strip_prefix(';')?.trim_start();
        if s.is_empty() {
            // Trailing semicolon
            break;
        }

        let (key, rest) = take_token(s);
        if key.is_empty() {
            return None;
        }
        let rest = rest.trim_start().strip_prefix('=')?.trim_start();
        let (value, rest) = if rest.starts_with('"') {
            take_quoted(rest)?
        } else {
            // Unquoted values run to the next `;`, so that common
            // `boundary=----=_Part_1` forms survive.
            let end = rest
                .find(|c: char| c == ';' || c.is_whitespace())
                .unwrap_or(rest.len());
            if end == 0 {
                return None;
            }
            (rest[..end].to_string(), &rest[end..])
        };
        s = rest;

        let key = key.to_ascii_lowercase();
        let previous = match key.find('*') {
            Some(star) => extended
                .entry(key[..star].to_string())
                .or_default()
                .insert(key[star..].to_string(), value),
            None => simple.insert(key, value),
        };
        if previous.is_some() {
            return None;
        }
    }

    for (name, pieces) in extended {
        if let Some(value) = assemble_extended(&pieces) {
            if simple.insert(name, value).is_some() {
                return None;
            }
        }
    }

    Some(simple)
}

/// Consume a quoted string starting at `"`, resolving backslash escapes.
fn take_quoted(s: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?.1),
            '"' => return Some((out, &s[i + 1..])),
            _ => out.push(c),
        }
    }
    None
}

/// Reassemble RFC 2231 `name*` / `name*0*` / `name*1` pieces.
///
/// `pieces` maps the key suffix (`"*"`, `"*0"`, `"*0*"`, ...) to its raw value.
fn assemble_extended(pieces: &BTreeMap<String, String>) -> Option<String> {
    if let Some(single) = pieces.get("*") {
        let (charset, encoded) = split_extended_value(single)?;
        return Some(decode_charset(charset, &unescape_extended(encoded)?));
    }

    let mut charset = "us-ascii";
    let mut bytes = Vec::new();
    for n in 0.. {
        if let Some(encoded) = pieces.get(&format!("*{n}*")) {
            let encoded = if n == 0 {
                let (cs, rest) = split_extended_value(encoded)?;
                charset = cs;
                rest
            } else {
                encoded.as_str()
            };
            bytes.extend(unescape_extended(encoded)?);
        } else if let Some(plain) = pieces.get(&format!("*{n}")) {
            bytes.extend_from_slice(plain.as_bytes());
        } else {
            break;
        }
    }

    if bytes.is_empty() {
        None
    } else {
        Some(decode_charset(charset, &bytes))
    }
}

/// Split `charset'language'value`.
fn split_extended_value(s: &str) -> Option<(&str, &str)> {
    let mut it = s.splitn(3, '\'');
    let charset = it.next()?;
    let _language = it.next()?;
    let value = it.next()?;
    Some((if charset.is_empty() { "us-ascii" } else { charset }, value))
}

/// Percent-decode an extended value. A `%` not followed by two hex digits
/// makes the whole value unusable.
fn unescape_extended(s: &str) -> Option<Vec<u8>> {
    let well_formed = s.split('%').skip(1).all(|rest| {
        rest.as_bytes()
            .get(..2)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    well_formed.then(|| percent_decode_str(s).collect())
}

// ── Encoded words ───────────────────────────────────────────────

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two encoded words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some((text, consumed)) = try_decode_one_word(after_start) {
            result.push_str(&text);
            remaining = &after_start[consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=`; returns the text and the bytes consumed.
fn try_decode_one_word(s: &str) -> Option<(String, usize)> {
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let bytes = match encoding {
        "B" | "b" => STANDARD.decode(encoded_text).ok()?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    // RFC 2231 language suffix: `UTF-8*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    Some((
        decode_charset(charset, &bytes),
        first_q + 1 + second_q + 1 + end + 2,
    ))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match charset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" | "us-ascii" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(charset, "Unknown charset, falling back to UTF-8 lossy");
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

// ── Dates ───────────────────────────────────────────────────────

/// Parse an email `Date:` value.
///
/// Supports RFC 2822, ISO 8601 and a few common broken variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);
    let replaced = replace_named_tz(&no_dow);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];

    for candidate in [&no_dow, &replaced] {
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim_start_matches(',').trim().to_string();
        }
    }
    s.to_string()
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CET", "+0100"),
        ("CEST", "+0200"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}
