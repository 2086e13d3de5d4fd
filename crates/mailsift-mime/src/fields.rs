//! Decoding of the top-level header fields kept in a parsed message.

use crate::encoding::decode_rfc2047;
use crate::header::Headers;
use crate::issue::{Diagnostics, Issue};
use chrono::{DateTime, FixedOffset, Utc};

/// Delimiter address headers are split on.
///
/// This is a literal split, not an address-grammar parse: a display name
/// containing `", "` is split too.
pub const ADDRESS_DELIMITER: &str = ", ";

/// RFC 2047 decoded `From`, `To`, `Cc`, `Subject` and `Date` values.
///
/// A missing header decodes to an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    /// Decoded `From` header.
    pub from: String,
    /// Decoded `To` header.
    pub to: String,
    /// Decoded `Cc` header.
    pub cc: String,
    /// Decoded `Subject` header.
    pub subject: String,
    /// Decoded `Date` header.
    pub date: String,
}

impl HeaderFields {
    pub(crate) fn decode(headers: &Headers, diagnostics: &mut Diagnostics) -> Self {
        let mut field = |name: &'static str| decode_field(headers, name, diagnostics);
        Self {
            from: field("From"),
            to: field("To"),
            cc: field("Cc"),
            subject: field("Subject"),
            date: field("Date"),
        }
    }
}

fn decode_field(headers: &Headers, name: &'static str, diagnostics: &mut Diagnostics) -> String {
    let raw = headers.get(name).unwrap_or_default();
    match decode_rfc2047(raw) {
        Ok(decoded) => decoded,
        Err(e) => {
            diagnostics.record(Issue::HeaderDecode {
                field: name,
                error: e.to_string(),
            });
            raw.to_string()
        }
    }
}

/// Splits a decoded address header on [`ADDRESS_DELIMITER`].
///
/// An empty header yields no addresses.
#[must_use]
pub fn split_addresses(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(ADDRESS_DELIMITER).map(str::to_string).collect()
}

/// Parses an RFC 2822 date, with or without the weekday and with an
/// optional trailing comment such as `(UTC)`.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DateTime::<FixedOffset>::parse_from_rfc2822(value)
        .or_else(|e| {
            strip_trailing_comment(value)
                .map_or(Err(e), DateTime::<FixedOffset>::parse_from_rfc2822)
        })
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn strip_trailing_comment(value: &str) -> Option<&str> {
    if !value.ends_with(')') {
        return None;
    }
    value.rfind('(').map(|open| value[..open].trim_end())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_fields() {
        let headers = Headers::parse(concat!(
            "From: =?utf-8?Q?Ren=C3=A9?= <rene@example.com>\r\n",
            "To: a@example.com, b@example.com\r\n",
            "Subject: =?utf-8?B?SMOpbGxv?=\r\n",
            "Date: 1 Jan 2024 10:00:00 +0000\r\n",
        ))
        .unwrap();
        let mut diagnostics = Diagnostics::default();

        let fields = HeaderFields::decode(&headers, &mut diagnostics);
        assert_eq!(fields.from, "René <rene@example.com>");
        assert_eq!(fields.to, "a@example.com, b@example.com");
        assert_eq!(fields.cc, "");
        assert_eq!(fields.subject, "Héllo");
        assert_eq!(fields.date, "1 Jan 2024 10:00:00 +0000");
        assert!(diagnostics.into_issues().is_empty());
    }

    #[test]
    fn test_decode_failure_keeps_raw_value() {
        let headers = Headers::parse("Subject: =?x-unknown?Q?abc?= tail\r\n").unwrap();
        let mut diagnostics = Diagnostics::default();

        let fields = HeaderFields::decode(&headers, &mut diagnostics);
        assert_eq!(fields.subject, "=?x-unknown?Q?abc?= tail");
        assert!(matches!(
            diagnostics.into_issues().as_slice(),
            [Issue::HeaderDecode {
                field: "Subject",
                ..
            }]
        ));
    }

    #[test]
    fn test_split_addresses() {
        assert_eq!(
            split_addresses("a@example.com, b@example.com"),
            ["a@example.com", "b@example.com"]
        );
        assert_eq!(split_addresses("a@example.com,b@example.com").len(), 1);
        assert!(split_addresses("").is_empty());
    }

    #[test]
    fn test_split_addresses_display_name_mis_split() {
        let addresses = split_addresses("\"Doe, John\" <john@example.com>");
        assert_eq!(addresses, ["\"Doe", "John\" <john@example.com>"]);
    }

    #[test]
    fn test_parse_date() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_date("1 Jan 2024 10:00:00 +0000"), Some(expected));
        assert_eq!(parse_date("Mon, 1 Jan 2024 10:00:00 +0000"), Some(expected));
        assert_eq!(parse_date("Mon, 1 Jan 2024 12:00:00 +0200"), Some(expected));
        assert_eq!(parse_date("Mon, 1 Jan 2024 10:00:00 +0000 (UTC)"), Some(expected));
    }

    #[test]
    fn test_parse_date_invalid() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday at noon"), None);
    }
}
