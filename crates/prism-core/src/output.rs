//! Writing stage results as JSON or JSON Lines.
//!
//! Results are written as their payload: the telemetry map plus, for direct
//! invocations, `operation` and any inline `image_data`.

use serde_json::Value;
use std::io::{self, Write};

use crate::types::StageResult;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON object or array
    Json,
    /// One JSON object per line
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Serializes [`StageResult`] payloads to a writer.
pub struct ResultWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    include_image_data: bool,
    items_written: usize,
}

impl<W: Write> ResultWriter<W> {
    /// Create a writer. `pretty` only affects the JSON format.
    ///
    /// Inline image data is left out unless enabled with
    /// [`ResultWriter::include_image_data`].
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            include_image_data: false,
            items_written: 0,
        }
    }

    /// Keep the base64 `image_data` field in written payloads.
    pub fn include_image_data(mut self, include: bool) -> Self {
        self.include_image_data = include;
        self
    }

    fn payload(&self, result: &StageResult) -> Value {
        Value::Object(if self.include_image_data {
            result.to_payload()
        } else {
            result.redacted()
        })
    }

    fn write_value(&mut self, value: &Value, pretty: bool) -> io::Result<()> {
        if pretty {
            serde_json::to_writer_pretty(&mut self.writer, value).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, value).map_err(io::Error::other)?;
        }
        writeln!(self.writer)
    }

    /// Write one result.
    pub fn write(&mut self, result: &StageResult) -> io::Result<()> {
        let payload = self.payload(result);
        let pretty = self.pretty && self.format == OutputFormat::Json;
        self.write_value(&payload, pretty)?;
        self.items_written += 1;
        Ok(())
    }

    /// Write several results: a JSON array, or one line each.
    pub fn write_all(&mut self, results: &[StageResult]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let payloads = results.iter().map(|r| self.payload(r)).collect();
                self.write_value(&Value::Array(payloads), self.pretty)?;
                self.items_written += results.len();
            }
            OutputFormat::JsonLines => {
                for result in results {
                    self.write(result)?;
                }
            }
        }
        Ok(())
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Consume the writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
