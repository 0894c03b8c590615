use slicesim_abstract::{ConfigError, Direction, SchedulerError};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where in a run a scheduler failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Allocation,
    SliceStep(Direction),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => f.write_str("setup"),
            Phase::Allocation => f.write_str("inter-slice allocation"),
            Phase::SliceStep(direction) => write!(f, "{direction} scheduling"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("duplicate slice label '{0}'")]
    DuplicateSlice(String),
    #[error("log I/O error on {path:?}: {source}")]
    LogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed log {path:?} line {line}: {reason}")]
    MetricsComputation {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("{phase} failed for '{label}' at {time_ms} ms: {source}")]
    Process {
        phase: Phase,
        label: String,
        time_ms: u64,
        #[source]
        source: SchedulerError,
    },
}

impl SimError {
    pub(crate) fn log_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SimError::LogIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(phase: Phase, label: &str, time_ms: u64, reason: String) -> Self {
        SimError::Process {
            phase,
            label: label.to_string(),
            time_ms,
            source: SchedulerError::MalformedRequest(reason),
        }
    }
}
