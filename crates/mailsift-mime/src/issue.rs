//! Recoverable problems met while parsing.
//!
//! None of these abort a parse. Each one is logged through `tracing` when
//! it is recorded and returned to the caller by
//! [`Parser::parse_detailed`](crate::Parser::parse_detailed).

use crate::encoding::TransferEncoding;
use std::fmt;

/// A recovered parsing problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// A header carried a malformed encoded word; its raw value was kept.
    HeaderDecode {
        /// Header name.
        field: &'static str,
        /// Decoder error message.
        error: String,
    },
    /// The `Date` header could not be parsed; the default timestamp was used.
    DateParse {
        /// The decoded header value.
        value: String,
    },
    /// A multipart sub-part had an unreadable header block and was skipped.
    MalformedPart {
        /// Boundary of the enclosing multipart body.
        boundary: String,
        /// Nesting depth of the enclosing multipart body.
        depth: usize,
        /// Header parser error message.
        error: String,
    },
    /// A payload failed its transfer decoding and contributed no bytes.
    PayloadDecode {
        /// Part name, or `None` for a single-part message body.
        part: Option<String>,
        /// Declared transfer encoding.
        encoding: TransferEncoding,
        /// Decoder error message.
        error: String,
    },
    /// A multipart content type had no boundary; it contributed no parts.
    MissingBoundary {
        /// Depth the multipart body would have been walked at.
        depth: usize,
    },
    /// A multipart body nested deeper than the configured maximum was skipped.
    DepthExceeded {
        /// Boundary of the skipped body.
        boundary: String,
        /// Depth the body would have been walked at.
        depth: usize,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderDecode { field, error } => {
                write!(f, "cannot decode {field} header: {error}")
            }
            Self::DateParse { value } => write!(f, "cannot parse date {value:?}"),
            Self::MalformedPart {
                boundary,
                depth,
                error,
            } => write!(
                f,
                "skipped part under boundary {boundary:?} at depth {depth}: {error}"
            ),
            Self::PayloadDecode {
                part,
                encoding,
                error,
            } => match part {
                Some(name) => write!(f, "cannot decode {encoding} part {name:?}: {error}"),
                None => write!(f, "cannot decode {encoding} body: {error}"),
            },
            Self::MissingBoundary { depth } => {
                write!(f, "multipart body at depth {depth} has no boundary")
            }
            Self::DepthExceeded { boundary, depth } => write!(
                f,
                "multipart body {boundary:?} at depth {depth} exceeds the maximum depth"
            ),
        }
    }
}

/// Collects issues for one parse invocation.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    issues: Vec<Issue>,
}

impl Diagnostics {
    pub(crate) fn record(&mut self, issue: Issue) {
        tracing::warn!(%issue, "Recovered from malformed input");
        self.issues.push(issue);
    }

    pub(crate) fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let issue = Issue::PayloadDecode {
            part: Some("b1-1.txt".to_string()),
            encoding: TransferEncoding::Base64,
            error: "bad".to_string(),
        };
        assert_eq!(issue.to_string(), "cannot decode base64 part \"b1-1.txt\": bad");

        let issue = Issue::MissingBoundary { depth: 2 };
        assert_eq!(issue.to_string(), "multipart body at depth 2 has no boundary");
    }

    #[test]
    fn test_diagnostics_keep_order() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.record(Issue::MissingBoundary { depth: 1 });
        diagnostics.record(Issue::DateParse {
            value: "yesterday".to_string(),
        });

        let issues = diagnostics.into_issues();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0], Issue::MissingBoundary { depth: 1 });
    }
}
