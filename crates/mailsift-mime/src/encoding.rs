//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header decoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use charset::Charset;
use std::fmt;

/// Standard padded alphabet that tolerates non-zero bits in the final
/// symbol, as many mail producers emit them.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit" and unknown tags)
        }
    }

    /// Reverses this transfer encoding.
    ///
    /// Identity encodings return the input unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid for the encoding.
    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(data),
            Self::QuotedPrintable => decode_quoted_printable(data),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(data.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Decodes Base64 data.
///
/// Whitespace (including line breaks) is removed before decoding.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Trailing whitespace is stripped from every line, soft line breaks are
/// removed and hard line endings are kept as they appear in the input.
/// An `=` that does not start a valid `=XX` escape is kept as a literal.
///
/// # Errors
///
/// Never fails; the `Result` keeps the signature in line with the other
/// transfer decoders.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());

    for line in data.split_inclusive(|&b| b == b'\n') {
        let (content, eol) = split_line_ending(line);
        let content = trim_trailing_whitespace(content);

        // Soft line break
        let (content, soft) = match content.strip_suffix(b"=") {
            Some(content) => (content, true),
            None => (content, false),
        };

        unescape_lenient(content, &mut result);
        if !soft {
            result.extend_from_slice(eol);
        }
    }

    Ok(result)
}

fn split_line_ending(line: &[u8]) -> (&[u8], &[u8]) {
    if let Some(content) = line.strip_suffix(b"\r\n") {
        (content, &line[content.len()..])
    } else if let Some(content) = line.strip_suffix(b"\n") {
        (content, &line[content.len()..])
    } else {
        (line, &line[line.len()..])
    }
}

fn trim_trailing_whitespace(mut bytes: &[u8]) -> &[u8] {
    while let [rest @ .., b' ' | b'\t'] = bytes {
        bytes = rest;
    }
    bytes
}

/// Resolves `=XX` escapes, appending the result to `out`. Malformed
/// escapes are copied through.
fn unescape_lenient(input: &[u8], out: &mut Vec<u8>) {
    let mut rest = input;

    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'='
            && let [hi, lo, after @ ..] = tail
            && let Ok(value) = hex_pair(*hi, *lo)
        {
            out.push(value);
            rest = after;
            continue;
        }
        out.push(byte);
        rest = tail;
    }
}

/// Resolves `=XX` escapes, appending the result to `out`.
fn unescape_strict(input: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut bytes = input.iter().copied();

    while let Some(byte) = bytes.next() {
        if byte != b'=' {
            out.push(byte);
            continue;
        }

        match (bytes.next(), bytes.next()) {
            (Some(hi), Some(lo)) => out.push(hex_pair(hi, lo)?),
            _ => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn hex_pair(hi: u8, lo: u8) -> Result<u8> {
    let digit = |b: u8| {
        char::from(b)
            .to_digit(16)
            .ok_or_else(|| Error::InvalidEncoding(format!("Invalid hex: {:?}", char::from(b))))
    };
    let value = (digit(hi)? << 4) | digit(lo)?;
    u8::try_from(value).map_err(|e| Error::InvalidEncoding(e.to_string()))
}

/// Decodes RFC 2047 encoded words in a header value.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// Encoded words may be mixed with literal text. Whitespace that separates
/// two adjacent encoded words is dropped. Sequences that only look like the
/// start of an encoded word are copied through unchanged.
///
/// # Errors
///
/// Returns an error if an encoded word names an unknown charset or
/// carries an invalid payload.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (literal, candidate) = rest.split_at(start);

        if let Some((word, consumed)) = EncodedWord::parse(candidate) {
            if !(after_word && literal.chars().all(char::is_whitespace)) {
                result.push_str(literal);
            }
            result.push_str(&word.decode()?);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            result.push_str(literal);
            result.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }

    result.push_str(rest);
    Ok(result)
}

/// A single `=?charset?encoding?text?=` token.
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: char,
    text: &'a str,
}

impl<'a> EncodedWord<'a> {
    /// Parses an encoded word at the start of `s`, returning it together
    /// with the number of bytes it spans.
    fn parse(s: &'a str) -> Option<(Self, usize)> {
        let inner = s.strip_prefix("=?")?;
        let (charset, after) = inner.split_once('?')?;
        let mut chars = after.chars();
        let encoding = chars.next()?;
        let body = chars.as_str().strip_prefix('?')?;
        let end = body.find("?=")?;
        let text = &body[..end];

        if charset.is_empty() || charset.contains(char::is_whitespace) {
            return None;
        }
        if text.contains(char::is_whitespace) {
            return None;
        }

        let consumed = s.len() - body.len() + end + 2;
        Some((
            Self {
                charset,
                encoding,
                text,
            },
            consumed,
        ))
    }

    fn decode(&self) -> Result<String> {
        let bytes = match self.encoding.to_ascii_uppercase() {
            'B' => BASE64.decode(self.text)?,
            'Q' => {
                let mut bytes = Vec::with_capacity(self.text.len());
                let underscored = self.text.replace('_', " ");
                unescape_strict(underscored.as_bytes(), &mut bytes)?;
                bytes
            }
            other => {
                return Err(Error::InvalidEncoding(format!(
                    "Unknown encoding: {other}"
                )));
            }
        };

        // RFC 2231 allows a language suffix: utf-8*en
        let label = self
            .charset
            .split_once('*')
            .map_or(self.charset, |(label, _)| label);
        let charset = Charset::for_label_no_replacement(label.as_bytes())
            .ok_or_else(|| Error::InvalidEncoding(format!("Unknown charset: {label}")))?;
        let (decoded, malformed) = charset.decode_without_bom_handling(&bytes);
        if malformed {
            tracing::debug!(charset = label, "Encoded word contains malformed sequences");
        }

        Ok(decoded.into_owned())
    }
}
