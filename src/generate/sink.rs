//! Destinations for reserved aliases.
//!
//! The generation loop hands every successfully reserved [`AliasRecord`] to a
//! [`ResultSink`] as soon as it is reserved, so records survive an aborted run.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::alias::AliasRecord;

/// Timestamp layout used in detailed output lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Errors raised while persisting a record.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output file could not be opened or written.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Receives every reserved alias, in reservation order.
pub trait ResultSink: Send {
    /// Persists one reserved record.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the record cannot be stored; the run stops.
    fn accept(&mut self, record: &AliasRecord) -> Result<(), SinkError>;
}

/// In-memory sink, mostly useful for tests and library callers.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Vec<AliasRecord>,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the records accepted so far.
    #[must_use]
    pub fn records(&self) -> &[AliasRecord] {
        &self.records
    }

    /// Consumes the sink, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<AliasRecord> {
        self.records
    }
}

impl ResultSink for CollectingSink {
    fn accept(&mut self, record: &AliasRecord) -> Result<(), SinkError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Line layout written by [`LineFileSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFormat {
    /// Just the address.
    #[default]
    Address,
    /// `label;address;YYYY-MM-DD HH:MM;status`
    Detailed,
}

impl RecordFormat {
    /// Renders one record as a single line (without newline).
    #[must_use]
    pub fn render(self, record: &AliasRecord) -> String {
        match self {
            Self::Address => record.address.clone(),
            Self::Detailed => format!(
                "{};{};{};{}",
                record.label.replace(';', ","),
                record.address,
                record.created_at.format(TIMESTAMP_FORMAT),
                record.status
            ),
        }
    }
}

/// Appends one line per record to a file, flushing after each record.
#[derive(Debug)]
pub struct LineFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    format: RecordFormat,
    written: usize,
}

impl LineFileSink {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] when the file cannot be opened.
    pub fn append(path: impl AsRef<Path>, format: RecordFormat) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "opened output file");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            format,
            written: 0,
        })
    }

    /// Returns the output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns how many records this sink has written.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }
}

impl ResultSink for LineFileSink {
    fn accept(&mut self, record: &AliasRecord) -> Result<(), SinkError> {
        let line = self.format.render(record);
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.written += 1;
        Ok(())
    }
}
