//! Message assembly: the top-level parse entry point.

use crate::content_type::ContentType;
use crate::encoding::TransferEncoding;
use crate::error::{Error, Result};
use crate::fields::{HeaderFields, parse_date, split_addresses};
use crate::header::{Headers, split_header_body};
use crate::issue::{Diagnostics, Issue};
use crate::multipart::{PartBuffer, Walker};
use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// Default maximum multipart nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Parser configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ParseOptions {
    /// Deepest multipart nesting that is walked. The top-level multipart
    /// body is depth 1; deeper bodies are skipped and reported.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Header metadata and decoded main content of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParsedMessage {
    /// Parsed `Date`, or the UNIX epoch when missing or unparsable.
    pub send_date: DateTime<Utc>,
    /// `To` addresses.
    pub to: Vec<String>,
    /// `Cc` addresses.
    pub cc: Vec<String>,
    /// `From` addresses.
    pub from: Vec<String>,
    /// Decoded `Subject`.
    pub subject: String,
    /// Decoded body, or the concatenated non-binary parts of a multipart body.
    pub content: Vec<u8>,
}

impl ParsedMessage {
    /// Returns the content as text, replacing invalid UTF-8.
    #[must_use]
    pub fn content_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Full result of [`Parser::parse_detailed`].
#[derive(Debug, Clone)]
pub struct Parsed {
    /// The parsed message.
    pub message: ParsedMessage,
    /// Named part buffers, for multipart bodies only.
    pub parts: Option<PartBuffer>,
    /// Problems recovered from while parsing, in the order met.
    pub issues: Vec<Issue>,
}

/// How the body of a message is laid out.
enum Layout {
    SinglePart,
    Multipart(ContentType),
}

impl Layout {
    fn resolve(headers: &Headers) -> Self {
        match headers.get("content-type").map(ContentType::parse) {
            Some(Ok(content_type)) if content_type.is_multipart() => Self::Multipart(content_type),
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Unparsable content type, decoding as a single part");
                Self::SinglePart
            }
            _ => Self::SinglePart,
        }
    }
}

/// MIME message parser.
///
/// A parser holds no per-message state; one instance can be shared by any
/// number of concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: ParseOptions,
}

impl Parser {
    /// Creates a parser with the given options.
    #[must_use]
    pub const fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Parses a raw RFC 822 message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the header block cannot be
    /// separated from the body. Every other problem is recovered from.
    pub fn parse(&self, raw: &[u8]) -> Result<ParsedMessage> {
        self.parse_detailed(raw).map(|parsed| parsed.message)
    }

    /// Parses a raw RFC 822 message, keeping the part buffers and the list
    /// of recovered problems.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the header block cannot be
    /// separated from the body.
    pub fn parse_detailed(&self, raw: &[u8]) -> Result<Parsed> {
        if raw.is_empty() {
            return Err(Error::MalformedMessage("empty input".to_string()));
        }
        let (headers, body) =
            split_header_body(raw).map_err(|e| Error::MalformedMessage(e.to_string()))?;

        let mut diagnostics = Diagnostics::default();
        let fields = HeaderFields::decode(&headers, &mut diagnostics);

        let send_date = parse_date(&fields.date).unwrap_or_else(|| {
            if !fields.date.trim().is_empty() {
                diagnostics.record(Issue::DateParse {
                    value: fields.date.clone(),
                });
            }
            DateTime::default()
        });

        let (content, parts) = match Layout::resolve(&headers) {
            Layout::SinglePart => (decode_single(&headers, body, &mut diagnostics), None),
            Layout::Multipart(content_type) => {
                let buffer = self.walk(&content_type, body, &mut diagnostics);
                (buffer.content(), Some(buffer))
            }
        };

        let message = ParsedMessage {
            send_date,
            to: split_addresses(&fields.to),
            cc: split_addresses(&fields.cc),
            from: split_addresses(&fields.from),
            subject: fields.subject,
            content,
        };

        Ok(Parsed {
            message,
            parts,
            issues: diagnostics.into_issues(),
        })
    }

    fn walk(
        &self,
        content_type: &ContentType,
        body: &[u8],
        diagnostics: &mut Diagnostics,
    ) -> PartBuffer {
        let mut buffer = PartBuffer::new();
        match content_type.boundary() {
            Some(boundary) => {
                Walker::new(self.options.max_depth, diagnostics).walk(body, boundary, 1, &mut buffer);
            }
            None => diagnostics.record(Issue::MissingBoundary { depth: 1 }),
        }
        tracing::debug!(parts = buffer.len(), "Walked multipart body");
        buffer
    }
}

fn decode_single(headers: &Headers, body: &[u8], diagnostics: &mut Diagnostics) -> Vec<u8> {
    let encoding = headers
        .get("content-transfer-encoding")
        .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);

    encoding.decode(body).unwrap_or_else(|e| {
        diagnostics.record(Issue::PayloadDecode {
            part: None,
            encoding,
            error: e.to_string(),
        });
        Vec::new()
    })
}

/// Parses a raw RFC 822 message with default options.
///
/// # Errors
///
/// Returns [`Error::MalformedMessage`] if the header block cannot be
/// separated from the body.
pub fn parse(raw: &[u8]) -> Result<ParsedMessage> {
    Parser::default().parse(raw)
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
    fn test_single_part_identity() {
        let raw = b"Subject: Hi\r\nContent-Type: text/plain\r\n\r\nHello, World!\r\n";
        let message = parse(raw).unwrap();
        assert_eq!(message.subject, "Hi");
        assert_eq!(message.content, b"Hello, World!\r\n");
        assert_eq!(message.content_text(), "Hello, World!\r\n");
    }

    #[test]
    fn test_single_part_without_content_type() {
        let raw = b"Content-Transfer-Encoding: Base64\r\n\r\nSGk=\r\n";
        let message = parse(raw).unwrap();
        assert_eq!(message.content, b"Hi");
    }

    #[test]
    fn test_single_part_unparsable_content_type() {
        let raw = b"Content-Type: ???\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\na=3Db";
        let message = parse(raw).unwrap();
        assert_eq!(message.content, b"a=b");
    }

    #[test]
    fn test_single_part_bad_payload() {
        let raw = b"Content-Transfer-Encoding: base64\r\n\r\n%%%\r\n";
        let parsed = Parser::default().parse_detailed(raw).unwrap();
        assert!(parsed.message.content.is_empty());
        assert!(parsed.parts.is_none());
        assert!(matches!(
            parsed.issues.as_slice(),
            [Issue::PayloadDecode { part: None, .. }]
        ));
    }

    #[test]
    fn test_multipart_without_boundary() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\n--x\r\n\r\nbody\r\n--x--\r\n";
        let parsed = Parser::default().parse_detailed(raw).unwrap();
        assert!(parsed.message.content.is_empty());
        assert!(parsed.parts.unwrap().is_empty());
        assert_eq!(parsed.issues, vec![Issue::MissingBoundary { depth: 1 }]);
    }

    #[test]
    fn test_headers_only_message() {
        let message = parse(b"Subject: nothing else").unwrap();
        assert_eq!(message.subject, "nothing else");
        assert!(message.content.is_empty());
        assert!(message.to.is_empty());
    }

    #[test]
    fn test_zero_depth_walks_nothing() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n--x\r\n\r\nbody\r\n--x--\r\n";
        let parser = Parser::new(ParseOptions { max_depth: 0 });
        let parsed = parser.parse_detailed(raw).unwrap();
        assert!(parsed.message.content.is_empty());
        assert!(matches!(
            parsed.issues.as_slice(),
            [Issue::DepthExceeded { depth: 1, .. }]
        ));
    }

    #[test]
    fn test_framing_errors() {
        assert!(matches!(parse(b""), Err(Error::MalformedMessage(_))));
        assert!(matches!(
            parse(b" leading continuation\r\n\r\nbody"),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            parse(b"no colon here\r\n\r\nbody"),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_unparsable_date_defaults() {
        let parsed = Parser::default()
            .parse_detailed(b"Date: not a date\r\n\r\nbody")
            .unwrap();
        assert_eq!(parsed.message.send_date, DateTime::<Utc>::default());
        assert_eq!(
            parsed.issues,
            vec![Issue::DateParse {
                value: "not a date".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_date_is_silent() {
        let parsed = Parser::default().parse_detailed(b"Subject: x\r\n\r\nbody").unwrap();
        assert_eq!(parsed.message.send_date, DateTime::<Utc>::default());
        assert!(parsed.issues.is_empty());
    }
}
