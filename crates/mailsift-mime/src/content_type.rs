//! MIME content type and content disposition handling.

use crate::error::{Error, Result};
use charset::Charset;
use percent_encoding::percent_decode_str;
use std::collections::{BTreeMap, HashMap};

/// Characters that may not appear in a MIME token (RFC 2045 `tspecials`).
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx).
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present and non-empty.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters
            .get("boundary")
            .map(String::as_str)
            .filter(|b| !b.is_empty())
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="quoted value"`
    ///
    /// # Errors
    ///
    /// Returns an error if the type or subtype is missing or is not a
    /// valid token, or if a parameter has no `=`.
    pub fn parse(s: &str) -> Result<Self> {
        let segments = split_unquoted(s, ';');
        let mut segments = segments.into_iter();

        let type_str = segments.next().unwrap_or_default().trim();
        if type_str.is_empty() {
            return Err(Error::InvalidContentType("Empty content type".to_string()));
        }

        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype: {type_str}")))?;
        let main_type = main_type.trim();
        let sub_type = sub_type.trim();
        if !is_token(main_type) || !is_token(sub_type) {
            return Err(Error::InvalidContentType(format!(
                "Invalid media type: {type_str}"
            )));
        }

        Ok(Self {
            main_type: main_type.to_lowercase(),
            sub_type: sub_type.to_lowercase(),
            parameters: parse_parameters(segments)?,
        })
    }
}

/// MIME content disposition (RFC 2183).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type (e.g., "inline", "attachment").
    pub kind: String,
    /// Parameters (e.g., filename=report.pdf).
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Returns the filename parameter if present and non-empty.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters
            .get("filename")
            .map(String::as_str)
            .filter(|f| !f.is_empty())
    }

    /// Parses a content disposition string.
    ///
    /// # Errors
    ///
    /// Returns an error if the disposition type is missing or invalid, or
    /// if a parameter has no `=`.
    pub fn parse(s: &str) -> Result<Self> {
        let segments = split_unquoted(s, ';');
        let mut segments = segments.into_iter();

        let kind = segments.next().unwrap_or_default().trim();
        if !is_token(kind) {
            return Err(Error::InvalidHeader(format!(
                "Invalid content disposition: {s}"
            )));
        }

        Ok(Self {
            kind: kind.to_lowercase(),
            parameters: parse_parameters(segments)?,
        })
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_graphic() && !TSPECIALS.contains(c))
}

/// Splits `s` on `sep`, ignoring separators inside quoted strings.
fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == sep && !quoted => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    parts.push(&s[start..]);
    parts
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .map(|v| v.strip_suffix('"').unwrap_or(v))
    else {
        return value.to_string();
    };

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// One piece of an RFC 2231 parameter (`name*`, `name*0`, `name*1*`, ...).
struct Segment {
    extended: bool,
    value: String,
}

/// Parses `key=value` segments into a lowercase-keyed map.
///
/// RFC 2231 extended (`name*=utf-8''a%20b`) and continued
/// (`name*0=..; name*1=..`) parameters are reassembled under `name`,
/// taking precedence over a plain `name=` value. Empty segments, as left
/// by a trailing `;`, are ignored.
fn parse_parameters<'a>(
    segments: impl Iterator<Item = &'a str>,
) -> Result<HashMap<String, String>> {
    let mut parameters = HashMap::new();
    let mut extended: HashMap<String, BTreeMap<u32, Segment>> = HashMap::new();

    for segment in segments {
        if segment.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = segment.split_once('=') else {
            return Err(Error::InvalidContentType(format!(
                "Parameter without value: {}",
                segment.trim()
            )));
        };
        let key = key.trim().to_lowercase();
        let value = unquote(value.trim());

        if !key.contains('*') {
            parameters.insert(key, value);
            continue;
        }
        let Some((name, section)) = key.split_once('*') else {
            continue;
        };

        let (index, is_extended) = match section {
            "" => (0, true),
            section => {
                let (number, star) = section
                    .strip_suffix('*')
                    .map_or((section, false), |n| (n, true));
                let Ok(index) = number.parse::<u32>() else {
                    continue;
                };
                (index, star)
            }
        };

        extended.entry(name.to_string()).or_default().insert(
            index,
            Segment {
                extended: is_extended,
                value,
            },
        );
    }

    for (name, pieces) in extended {
        if let Some(value) = assemble_extended(&pieces) {
            parameters.insert(name, value);
        }
    }

    Ok(parameters)
}

fn assemble_extended(pieces: &BTreeMap<u32, Segment>) -> Option<String> {
    let mut label = "utf-8";
    let mut bytes = Vec::new();

    for (index, piece) in pieces {
        if !piece.extended {
            bytes.extend_from_slice(piece.value.as_bytes());
            continue;
        }

        let mut encoded = piece.value.as_str();
        if *index == 0 {
            // charset'language'value
            let mut fields = encoded.splitn(3, '\'');
            match (fields.next(), fields.next(), fields.next()) {
                (Some(charset), Some(_language), Some(rest)) => {
                    if !charset.is_empty() {
                        label = charset;
                    }
                    encoded = rest;
                }
                _ => return None,
            }
        }
        bytes.extend(percent_decode_str(encoded));
    }

    let charset = Charset::for_label_no_replacement(label.as_bytes())?;
    let (decoded, _malformed) = charset.decode_without_bom_handling(&bytes);
    Some(decoded.into_owned())
}
