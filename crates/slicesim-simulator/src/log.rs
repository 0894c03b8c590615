//! Per-slice, per-direction traffic record files.

use slicesim_abstract::{Direction, RECORD_HEADER, TrafficRecord};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SimError;

/// Append-only statistics file for one (slice, direction) pair.
///
/// The first line is [`RECORD_HEADER`]; each following line is one
/// [`TrafficRecord`]. Dropping an open log flushes it on a best-effort basis,
/// [`TrafficLog::close`] flushes and reports errors.
#[derive(Debug)]
pub struct TrafficLog {
    path: PathBuf,
    direction: Direction,
    writer: Option<BufWriter<File>>,
    rows: u64,
}

impl TrafficLog {
    pub fn file_name(label: &str, direction: Direction) -> String {
        format!("{}Ststs_{}.txt", direction.file_prefix(), label)
    }

    /// Create (truncating) the log file and write its header.
    pub fn create(dir: &Path, label: &str, direction: Direction) -> Result<Self, SimError> {
        let path = dir.join(Self::file_name(label, direction));
        let file = File::create(&path).map_err(|e| SimError::log_io(&path, e))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{RECORD_HEADER}").map_err(|e| SimError::log_io(&path, e))?;
        Ok(Self {
            path,
            direction,
            writer: Some(writer),
            rows: 0,
        })
    }

    pub fn append(&mut self, record: &TrafficRecord) -> Result<(), SimError> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            SimError::log_io(&self.path, std::io::Error::other("log already closed"))
        })?;
        writeln!(writer, "{}", record.to_row()).map_err(|e| SimError::log_io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and release the file. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), SimError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| SimError::log_io(&self.path, e))?;
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}
