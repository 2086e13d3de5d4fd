//! # mailsift-mime
//!
//! Recursive MIME message decoding.
//!
//! ## Features
//!
//! - **Header fields**: RFC 2047 decoded `From`, `To`, `Cc`, `Subject`, `Date`
//! - **Transfer encodings**: Base64 and Quoted-Printable payload decoding
//! - **Multipart**: arbitrarily nested bodies flattened into named buffers,
//!   with a configurable depth limit
//! - **Part naming**: declared filenames, or names derived from the
//!   enclosing boundary and the content type
//! - **Recovered problems**: reported as [`Issue`] values and `tracing` events
//!
//! ## Quick Start
//!
//! ```
//! let raw = b"From: sender@example.com\r\n\
//!             To: a@example.com, b@example.com\r\n\
//!             Subject: Test\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = mailsift_mime::parse(raw)?;
//! assert_eq!(message.subject, "Test");
//! assert_eq!(message.to, ["a@example.com", "b@example.com"]);
//! assert_eq!(message.content, b"Hello, World!");
//! # Ok::<(), mailsift_mime::Error>(())
//! ```
//!
//! ### Inspecting parts
//!
//! ```
//! use mailsift_mime::{ParseOptions, Parser};
//!
//! let raw = b"Content-Type: multipart/mixed; boundary=b1\r\n\
//!             \r\n\
//!             --b1\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             body\r\n\
//!             --b1\r\n\
//!             Content-Type: application/octet-stream\r\n\
//!             Content-Transfer-Encoding: base64\r\n\
//!             \r\n\
//!             AAEC\r\n\
//!             --b1--\r\n";
//!
//! let parsed = Parser::new(ParseOptions::default()).parse_detailed(raw)?;
//! let parts = parsed.parts.expect("multipart body");
//! assert_eq!(parts.get("b1-1.bin"), Some(&[0u8, 1, 2][..]));
//! assert_eq!(parsed.message.content, b"body");
//! # Ok::<(), mailsift_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod fields;
mod header;
mod issue;
mod message;
mod multipart;
mod naming;

pub mod encoding;

pub use content_type::{ContentDisposition, ContentType};
pub use encoding::TransferEncoding;
pub use error::{Error, Result};
pub use fields::{ADDRESS_DELIMITER, HeaderFields, parse_date, split_addresses};
pub use header::{Headers, split_header_body};
pub use issue::Issue;
pub use message::{DEFAULT_MAX_DEPTH, ParseOptions, Parsed, ParsedMessage, Parser, parse};
pub use multipart::PartBuffer;
pub use naming::{BINARY_EXTENSION, FALLBACK_INDEX, extension_for, is_binary_name, name_for};
