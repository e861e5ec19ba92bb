//! Events sent from the batch worker to the front end.

use std::path::PathBuf;
use std::time::Duration;

use crate::batch::{Mode, RunState};
use crate::conversion_log::LogRecord;

/// Progress and outcome notifications of a batch run.
///
/// The front end only reads these; it never touches the worker's state.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Discovery finished and the log was loaded.
    Started {
        root: PathBuf,
        log_path: PathBuf,
        mode: Mode,
        total: usize,
    },
    /// Non-fatal problem, such as an unreadable directory or a skipped log row.
    Warning(String),
    /// File already has a successful log record and was skipped.
    AlreadyConverted { path: PathBuf },
    /// File would be converted (list mode).
    Listed { number: usize, path: PathBuf },
    /// External converter is about to run for this file.
    ConversionStarted {
        number: usize,
        path: PathBuf,
        destination: PathBuf,
    },
    /// File was processed and its record persisted.
    FileCompleted {
        number: usize,
        record: LogRecord,
        duration: Duration,
    },
    /// Overall progress in percent, 0 to 100, never decreasing.
    Progress(f64),
    /// Run ended. `processed` excludes skipped files.
    Finished { state: RunState, processed: usize },
}
