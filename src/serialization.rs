//! NDJSON input and output for entity messages.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, Write};

/// Error type for serialization operations
#[derive(Debug)]
pub enum SerializationError {
    JsonError { line: usize, source: serde_json::Error },
    IoError(std::io::Error),
}

impl From<std::io::Error> for SerializationError {
    fn from(err: std::io::Error) -> Self {
        SerializationError::IoError(err)
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::JsonError { line, source } => {
                write!(f, "JSON error on line {}: {}", line, source)
            }
            SerializationError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for SerializationError {}

/// NDJSON (Newline Delimited JSON) writer
///
/// Writes records as NDJSON, one JSON object per line.
pub struct NdjsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a single record as an NDJSON line
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<(), SerializationError> {
        let json = serde_json::to_string(record)
            .map_err(|source| SerializationError::JsonError { line: 0, source })?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    /// Write a line through unchanged, e.g. an input record that failed to parse
    pub fn write_raw(&mut self, line: &str) -> Result<(), SerializationError> {
        writeln!(self.writer, "{}", line.trim_end_matches(['\r', '\n']))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SerializationError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Parse one NDJSON line; `line` is the 1-based line number used in errors.
pub fn parse_ndjson_line<T: DeserializeOwned>(
    line: usize,
    text: &str,
) -> Result<T, SerializationError> {
    serde_json::from_str(text).map_err(|source| SerializationError::JsonError { line, source })
}

/// Read NDJSON records, skipping blank lines.
///
/// Each item carries its own error so one bad line does not stop the rest.
pub fn read_ndjson<T, R>(reader: R) -> impl Iterator<Item = Result<T, SerializationError>>
where
    T: DeserializeOwned,
    R: BufRead,
{
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(parse_ndjson_line(index + 1, &line)),
            Err(e) => Some(Err(SerializationError::IoError(e))),
        })
}
