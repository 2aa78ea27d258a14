//! Sender and recipient addresses as exposed by the Sendria API.

use serde::{Deserialize, Serialize};

/// One mailbox of a captured message.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `name = "Juan García"`, `email = "juan@ejemplo.com"`
/// - `"user@example.com"` → `name = ""`, `email = "user@example.com"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Display name, empty when the server only knows the address.
    #[serde(default)]
    pub name: String,
    /// The bare address (`user@domain`).
    pub email: String,
}

impl Recipient {
    /// Build a recipient from a bare address.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            email: email.into(),
        }
    }

    /// Parse a single mailbox from a header-style value.
    ///
    /// Accepts `user@domain`, `<user@domain>` and `Name <user@domain>`
    /// (with the name optionally quoted). Anything else is kept verbatim
    /// as the email.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    name: unquote(&trimmed[..open]),
                    email: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }

        Self::new(trimmed)
    }

    /// Parse a comma-separated list, honouring commas inside quotes and
    /// angle brackets. Empty entries are dropped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    results.push(Self::parse(&current));
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        results.push(Self::parse(&current));

        results.retain(|r| !r.email.is_empty());
        results
    }

    /// Whether this recipient's address matches `email`, ignoring ASCII case.
    pub fn matches(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
        .trim()
        .to_string()
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let r = Recipient::parse("user@example.com");
        assert_eq!(r.email, "user@example.com");
        assert_eq!(r.name, "");
    }

    #[test]
    fn test_parse_angle_address() {
        let r = Recipient::parse(" <user@example.com> ");
        assert_eq!(r.email, "user@example.com");
        assert_eq!(r.name, "");
    }

    #[test]
    fn test_parse_quoted_name() {
        let r = Recipient::parse("\"Last, First\" <user@example.com>");
        assert_eq!(r.name, "Last, First");
        assert_eq!(r.email, "user@example.com");
    }

    #[test]
    fn test_parse_list_with_quoted_comma() {
        let list = Recipient::parse_list("\"Last, First\" <a@b.com>, other@c.com, ");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Last, First");
        assert_eq!(list[1].email, "other@c.com");
    }

    #[test]
    fn test_matches_ignores_case() {
        let r = Recipient::new("Alice@Example.com");
        assert!(r.matches("alice@example.com"));
        assert!(!r.matches("bob@example.com"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Recipient::parse("Alice <a@b.c>").to_string(), "Alice <a@b.c>");
        assert_eq!(Recipient::new("a@b.c").to_string(), "a@b.c");
    }
}
