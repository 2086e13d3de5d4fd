//! Destinations for parsed messages.

use chrono::{DateTime, Utc};
use mailsift_mime::ParsedMessage;
use serde::Serialize;
use std::io::Write;

/// A stored message, one per source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailRecord {
    /// Source identifier, usually the file name.
    pub filename: String,
    /// Parsed `Date` header.
    pub send_date: DateTime<Utc>,
    /// When the record was produced.
    pub upload_date: DateTime<Utc>,
    /// `To` addresses.
    pub to: Vec<String>,
    /// `Cc` addresses.
    pub cc: Vec<String>,
    /// Decoded subject.
    pub subject: String,
    /// Decoded content, invalid UTF-8 replaced.
    pub content: String,
    /// `From` addresses.
    pub from: Vec<String>,
}

impl EmailRecord {
    /// Builds a record for `message` read from `filename`.
    pub fn new(filename: &str, message: &ParsedMessage, upload_date: DateTime<Utc>) -> Self {
        Self {
            filename: filename.to_string(),
            send_date: message.send_date,
            upload_date,
            to: message.to.clone(),
            cc: message.cc.clone(),
            subject: message.subject.clone(),
            content: message.content_text().into_owned(),
            from: message.from.clone(),
        }
    }
}

/// Consumes parsed messages.
pub trait Sink {
    /// Stores one parsed message under its source identifier.
    fn store(&mut self, source: &str, message: &ParsedMessage) -> anyhow::Result<()>;

    /// Flushes anything buffered.
    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes one JSON [`EmailRecord`] per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn store(&mut self, source: &str, message: &ParsedMessage) -> anyhow::Result<()> {
        let record = EmailRecord::new(source, message, Utc::now());
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
