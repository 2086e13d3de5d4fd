//! Stable names for decoded parts.
//!
//! A part keeps its declared filename when it has one. Otherwise the name
//! is built from the enclosing boundary (the radix), an index and an
//! extension looked up from the content type: `{radix}-{index}{ext}`.

use crate::content_type::{ContentDisposition, ContentType};
use crate::header::Headers;

/// Extension used when no extension is registered for a content type.
///
/// Parts whose name ends with it are left out of the aggregated content.
pub const BINARY_EXTENSION: &str = ".bin";

/// Index given to every terminal part by the multipart walker.
///
/// Siblings without a filename that share a content type therefore share a
/// name and are appended into the same buffer.
pub const FALLBACK_INDEX: usize = 1;

/// Extensions preferred over the `mime_guess` reverse mapping, whose first
/// entry is not always the conventional one.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("text/plain", ".txt"),
    ("text/html", ".html"),
    ("text/calendar", ".ics"),
    ("text/csv", ".csv"),
    ("text/xml", ".xml"),
    ("application/json", ".json"),
    ("application/pdf", ".pdf"),
    ("application/zip", ".zip"),
    ("application/octet-stream", BINARY_EXTENSION),
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
    ("message/rfc822", ".eml"),
];

/// Synthesizes the accumulator name of a part.
///
/// Returns, in order of preference:
/// 1. the `filename` of `Content-Disposition`, verbatim;
/// 2. `{radix}-{index}{ext}` when `Content-Type` parses, with `.bin` when
///    no extension is registered;
/// 3. an empty string when `Content-Type` is absent or unparsable.
#[must_use]
pub fn name_for(headers: &Headers, radix: &str, index: usize) -> String {
    let filename = headers
        .get("content-disposition")
        .and_then(|value| ContentDisposition::parse(value).ok())
        .and_then(|cd| cd.filename().map(str::to_string));
    if let Some(filename) = filename {
        return filename;
    }

    match headers.get("content-type").map(ContentType::parse) {
        Some(Ok(content_type)) => {
            let extension = extension_for(&content_type);
            format!("{radix}-{index}{extension}")
        }
        _ => String::new(),
    }
}

/// Returns the first registered extension (with its leading dot) for a
/// content type, or [`BINARY_EXTENSION`].
#[must_use]
pub fn extension_for(content_type: &ContentType) -> String {
    let essence = content_type.essence();

    if let Some((_, extension)) = PREFERRED_EXTENSIONS.iter().find(|(ty, _)| *ty == essence) {
        return (*extension).to_string();
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|extensions| extensions.first())
        .map_or_else(|| BINARY_EXTENSION.to_string(), |ext| format!(".{ext}"))
}

/// Returns `true` if a part name carries the binary fallback extension.
#[must_use]
pub fn is_binary_name(name: &str) -> bool {
    name.ends_with(BINARY_EXTENSION)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        let mut headers = Headers::new();
        for (name, value) in pairs {
            headers.add(*name, *value);
        }
        headers
    }

    #[test]
    fn test_explicit_filename_wins() {
        let h = headers(&[
            ("Content-Type", "text/plain"),
            ("Content-Disposition", "attachment; filename=\"../notes.TXT\""),
        ]);
        assert_eq!(name_for(&h, "b1", FALLBACK_INDEX), "../notes.TXT");
    }

    #[test]
    fn test_name_from_content_type() {
        let h = headers(&[("Content-Type", "text/plain; charset=utf-8")]);
        assert_eq!(name_for(&h, "b1", FALLBACK_INDEX), "b1-1.txt");

        let h = headers(&[("Content-Type", "text/html")]);
        assert_eq!(name_for(&h, "outer", 3), "outer-3.html");
    }

    #[test]
    fn test_disposition_without_filename_falls_through() {
        let h = headers(&[
            ("Content-Type", "image/png"),
            ("Content-Disposition", "inline"),
        ]);
        assert_eq!(name_for(&h, "b1", FALLBACK_INDEX), "b1-1.png");
    }

    #[test]
    fn test_unregistered_type_gets_binary_extension() {
        let h = headers(&[("Content-Type", "application/x-mailsift-unknown")]);
        let name = name_for(&h, "b1", FALLBACK_INDEX);
        assert_eq!(name, "b1-1.bin");
        assert!(is_binary_name(&name));
    }

    #[test]
    fn test_octet_stream_is_binary() {
        let h = headers(&[("Content-Type", "application/octet-stream")]);
        assert!(is_binary_name(&name_for(&h, "b1", FALLBACK_INDEX)));
    }

    #[test]
    fn test_missing_content_type_yields_empty_name() {
        assert_eq!(name_for(&Headers::new(), "b1", FALLBACK_INDEX), "");
    }

    #[test]
    fn test_unparsable_content_type_yields_empty_name() {
        let h = headers(&[("Content-Type", "garbage")]);
        assert_eq!(name_for(&h, "b1", FALLBACK_INDEX), "");

        let h = headers(&[("Content-Type", "text/plain; charset")]);
        assert_eq!(name_for(&h, "b1", FALLBACK_INDEX), "");
    }

    #[test]
    fn test_mime_guess_fallback() {
        let ct = ContentType::new("audio", "mpeg");
        let extension = extension_for(&ct);
        assert!(extension.starts_with('.'));
        assert_ne!(extension, BINARY_EXTENSION);
    }
}
