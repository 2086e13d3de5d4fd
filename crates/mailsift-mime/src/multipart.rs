//! Multipart body traversal.
//!
//! A multipart body is split on its boundary and each sub-part is either
//! walked in turn (nested multipart) or decoded into the shared
//! [`PartBuffer`]. Nested bodies are kept on an explicit stack so the
//! nesting depth can be capped without growing the call stack.

use crate::content_type::ContentType;
use crate::encoding::TransferEncoding;
use crate::header::{Headers, split_header_body};
use crate::issue::{Diagnostics, Issue};
use crate::naming::{FALLBACK_INDEX, is_binary_name, name_for};
use indexmap::IndexMap;

/// Decoded part payloads keyed by synthesized name.
///
/// Entries are kept in first-write order. Writing to an existing name
/// appends to its buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartBuffer {
    entries: IndexMap<String, Vec<u8>>,
}

impl PartBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes under `name`, creating the entry on first write.
    pub fn append(&mut self, name: &str, bytes: &[u8]) {
        if let Some(buffer) = self.entries.get_mut(name) {
            buffer.extend_from_slice(bytes);
        } else {
            self.entries.insert(name.to_string(), bytes.to_vec());
        }
    }

    /// Returns the bytes stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Returns `true` if an entry exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of named entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in first-write order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in first-write order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    /// Concatenates every entry whose name does not end in `.bin`, in
    /// first-write order.
    #[must_use]
    pub fn content(&self) -> Vec<u8> {
        self.iter()
            .filter(|(name, _)| !is_binary_name(name))
            .flat_map(|(_, bytes)| bytes.iter().copied())
            .collect()
    }
}

/// A multipart body whose sub-parts are still being visited.
struct Frame<'a> {
    boundary: String,
    depth: usize,
    parts: std::vec::IntoIter<&'a [u8]>,
}

impl<'a> Frame<'a> {
    fn new(body: &'a [u8], boundary: &str, depth: usize) -> Self {
        Self {
            boundary: boundary.to_string(),
            depth,
            parts: split_parts(body, boundary).into_iter(),
        }
    }
}

/// Walks a multipart tree, writing terminal parts into a [`PartBuffer`].
pub(crate) struct Walker<'d> {
    max_depth: usize,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Walker<'d> {
    pub(crate) const fn new(max_depth: usize, diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            max_depth,
            diagnostics,
        }
    }

    /// Visits every part of `body` in encounter order. Nested multipart
    /// bodies are flattened into the same buffer.
    pub(crate) fn walk(
        &mut self,
        body: &[u8],
        boundary: &str,
        depth: usize,
        buffer: &mut PartBuffer,
    ) {
        if depth > self.max_depth {
            self.diagnostics.record(Issue::DepthExceeded {
                boundary: boundary.to_string(),
                depth,
            });
            return;
        }

        let mut stack = vec![Frame::new(body, boundary, depth)];
        while let Some(frame) = stack.last_mut() {
            let Some(raw) = frame.parts.next() else {
                stack.pop();
                continue;
            };
            let depth = frame.depth;
            let radix = frame.boundary.clone();

            if let Some(nested) = self.visit(raw, &radix, depth, buffer) {
                stack.push(nested);
            }
        }
    }

    fn visit<'a>(
        &mut self,
        raw: &'a [u8],
        radix: &str,
        depth: usize,
        buffer: &mut PartBuffer,
    ) -> Option<Frame<'a>> {
        let (headers, payload) = match split_header_body(raw) {
            Ok(split) => split,
            Err(e) => {
                self.diagnostics.record(Issue::MalformedPart {
                    boundary: radix.to_string(),
                    depth,
                    error: e.to_string(),
                });
                return None;
            }
        };

        match headers.get("content-type").map(ContentType::parse) {
            Some(Ok(content_type)) if content_type.is_multipart() => {
                self.descend(&content_type, payload, depth + 1)
            }
            _ => {
                self.write_terminal(&headers, payload, radix, buffer);
                None
            }
        }
    }

    fn descend<'a>(
        &mut self,
        content_type: &ContentType,
        payload: &'a [u8],
        depth: usize,
    ) -> Option<Frame<'a>> {
        let Some(boundary) = content_type.boundary() else {
            self.diagnostics.record(Issue::MissingBoundary { depth });
            return None;
        };
        if depth > self.max_depth {
            self.diagnostics.record(Issue::DepthExceeded {
                boundary: boundary.to_string(),
                depth,
            });
            return None;
        }

        tracing::debug!(boundary, depth, "Descending into nested multipart");
        Some(Frame::new(payload, boundary, depth))
    }

    fn write_terminal(
        &mut self,
        headers: &Headers,
        payload: &[u8],
        radix: &str,
        buffer: &mut PartBuffer,
    ) {
        let name = name_for(headers, radix, FALLBACK_INDEX);
        let encoding = headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);

        match encoding.decode(payload) {
            Ok(decoded) => {
                tracing::debug!(name = %name, %encoding, bytes = decoded.len(), "Decoded part");
                buffer.append(&name, &decoded);
            }
            Err(e) => self.diagnostics.record(Issue::PayloadDecode {
                part: Some(name),
                encoding,
                error: e.to_string(),
            }),
        }
    }
}

/// Splits a multipart body into the raw bytes of its sub-parts.
///
/// The preamble before the first delimiter and the epilogue after the
/// closing delimiter are dropped. The line break before each delimiter
/// belongs to the delimiter. A body without a closing delimiter ends at
/// end of input.
fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut line_start = 0;

    while line_start < body.len() {
        let line_end =
            memchr::memchr(b'\n', &body[line_start..]).map_or(body.len(), |o| line_start + o);
        let next_line = (line_end + 1).min(body.len());

        if let Some(closing) = delimiter_kind(&body[line_start..line_end], delimiter) {
            if let Some(start) = part_start {
                parts.push(&body[start..part_end(body, start, line_start)]);
            }
            if closing {
                return parts;
            }
            part_start = Some(next_line);
        }

        line_start = next_line;
    }

    if let Some(start) = part_start {
        tracing::debug!(boundary, "Multipart body has no closing delimiter");
        if start < body.len() {
            parts.push(&body[start..]);
        }
    }

    parts
}

/// Returns `Some(true)` for a closing delimiter line, `Some(false)` for a
/// part delimiter line and `None` for any other line.
fn delimiter_kind(line: &[u8], delimiter: &[u8]) -> Option<bool> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let rest = line.strip_prefix(delimiter)?;
    let (closing, rest) = rest
        .strip_prefix(b"--")
        .map_or((false, rest), |rest| (true, rest));

    rest.iter()
        .all(|b| matches!(b, b' ' | b'\t'))
        .then_some(closing)
}

/// End of a part that is followed by a delimiter line starting at
/// `delimiter_start`.
fn part_end(body: &[u8], start: usize, delimiter_start: usize) -> usize {
    let mut end = delimiter_start;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end.max(start)
}
