//! MIME header handling.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Collection of email headers.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        let value = value.into();
        self.headers.entry(name).or_default().push(value);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns `true` if no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Parses headers from raw text.
    ///
    /// Headers are in the format:
    /// ```text
    /// Header-Name: value
    ///  continuation
    /// ```
    ///
    /// Parsing stops at the first empty line.
    ///
    /// # Errors
    ///
    /// Returns an error if the block starts with a continuation line or if
    /// a line has no `name:` prefix.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current_name: Option<String> = None;
        let mut current_value = String::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            // Continuation line (starts with space or tab)
            if line.starts_with(' ') || line.starts_with('\t') {
                if current_name.is_none() {
                    return Err(Error::InvalidHeader(format!(
                        "Continuation without a header: {line:?}"
                    )));
                }
                current_value.push(' ');
                current_value.push_str(line.trim());
                continue;
            }

            if let Some(name) = current_name.take() {
                headers.add(name, current_value.trim().to_string());
                current_value.clear();
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::InvalidHeader(format!("Missing colon: {line:?}")))?;
            let name = name.trim_end();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(Error::InvalidHeader(format!("Bad header name: {name:?}")));
            }
            current_name = Some(name.to_string());
            current_value = value.trim().to_string();
        }

        if let Some(name) = current_name {
            headers.add(name, current_value.trim().to_string());
        }

        Ok(headers)
    }
}

/// Splits a raw entity into its parsed header block and its body.
///
/// The header block ends at the first empty line (`\r\n` or `\n`). Input
/// without an empty line is all header and has an empty body.
///
/// # Errors
///
/// Returns an error if the header block is malformed.
pub fn split_header_body(raw: &[u8]) -> Result<(Headers, &[u8])> {
    let mut pos = 0;
    let (header_end, body_start) = loop {
        let Some(offset) = memchr::memchr(b'\n', &raw[pos..]) else {
            break (raw.len(), raw.len());
        };
        let line_end = pos + offset;
        let line = &raw[pos..line_end];
        if line.is_empty() || line == b"\r" {
            break (pos, line_end + 1);
        }
        pos = line_end + 1;
    };

    let headers = Headers::parse(&String::from_utf8_lossy(&raw[..header_end]))?;
    Ok((headers, &raw[body_start..]))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_repeated() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("To", "bob@example.com");
        assert_eq!(headers.get("To"), Some("alice@example.com"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n"
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("To"), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_headers_parse_rejects_leading_continuation() {
        assert!(matches!(
            Headers::parse(" folded: value\r\n"),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_headers_parse_rejects_missing_colon() {
        assert!(Headers::parse("From: a@example.com\r\nnot a header\r\n").is_err());
        assert!(Headers::parse("Bad Name: value\r\n").is_err());
    }

    #[test]
    fn test_split_header_body_crlf() {
        let raw = b"Subject: Hi\r\nX-Test: 1\r\n\r\nline one\r\n\r\nline two";
        let (headers, body) = split_header_body(raw).unwrap();
        assert_eq!(headers.get("subject"), Some("Hi"));
        assert_eq!(headers.get("x-test"), Some("1"));
        assert_eq!(body, b"line one\r\n\r\nline two");
    }

    #[test]
    fn test_split_header_body_bare_lf() {
        let (headers, body) = split_header_body(b"Subject: Hi\n\nbody\n").unwrap();
        assert_eq!(headers.get("subject"), Some("Hi"));
        assert_eq!(body, b"body\n");
    }

    #[test]
    fn test_split_header_body_no_headers() {
        let (headers, body) = split_header_body(b"\r\nonly body").unwrap();
        assert!(headers.is_empty());
        assert_eq!(body, b"only body");
    }

    #[test]
    fn test_split_header_body_no_body() {
        let (headers, body) = split_header_body(b"Subject: Hi\r\n").unwrap();
        assert_eq!(headers.get("subject"), Some("Hi"));
        assert!(body.is_empty());
    }
}
