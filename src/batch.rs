//! Batch orchestration: discover, skip, convert, log and archive.
//!
//! A run goes `Idle -> Running -> {ListDone | ConvertDone | Aborted}`.
//! Files are processed one at a time and the conversion log is saved after each one,
//! so a run can be interrupted at any point and resumed later.
//! The original is archived before its record is saved: a crash between the two leaves it
//! under the backup folder, no longer discovered, with no log row for it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::archive;
use crate::conversion_log::{ConversionLog, LOG_DIR_NAME, LogRecord, MalformedRowPolicy, Status};
use crate::converter::{Remuxer, destination_path};
use crate::discover::find_candidates;
use crate::error::{Result, Ts2Mp4Error};
use crate::event::Event;
use crate::filter::PathFilter;

/// Whether files are converted or only listed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    List,
    Convert,
}

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    ListDone,
    ConvertDone,
    Aborted,
}

/// Parameters for one run.
#[derive(Debug, Clone, Default)]
pub struct RunParams {
    pub root: PathBuf,
    pub mode: Mode,
    pub filter: PathFilter,
    pub malformed_rows: MalformedRowPolicy,
}

/// Counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub state: RunState,
    /// Candidates found after filtering.
    pub total: usize,
    /// Files listed or converted, skips excluded.
    pub processed: usize,
    pub already_converted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Sequential batch runner owning the conversion log during a run.
pub struct Batch<R: Remuxer> {
    remuxer: R,
    state: RunState,
    abort_flag: Arc<AtomicBool>,
}

/// A batch running on its own thread.
pub struct Worker {
    /// Events from the running batch. Closed when the run ends.
    pub events: Receiver<Event>,
    handle: JoinHandle<Result<RunSummary>>,
}

impl Mode {
    #[must_use]
    pub const fn from_convert_flag(convert: bool) -> Self {
        if convert { Self::Convert } else { Self::List }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Convert => write!(f, "convert"),
        }
    }
}

impl RunState {
    /// Returns true for the end states of a run.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::ListDone | Self::ConvertDone | Self::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::ListDone => "list done",
            Self::ConvertDone => "convert done",
            Self::Aborted => "aborted",
        };
        write!(f, "{name}")
    }
}

impl RunParams {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            root: root.into(),
            mode,
            ..Self::default()
        }
    }

    /// Backup root holding the log and archived originals.
    #[must_use]
    pub fn backup_root(&self) -> PathBuf {
        self.root.join(LOG_DIR_NAME)
    }

    /// Conversion log location.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        ConversionLog::path_for_root(&self.root)
    }
}

impl<R: Remuxer> Batch<R> {
    pub fn new(remuxer: R) -> Self {
        Self {
            remuxer,
            state: RunState::Idle,
            abort_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use an existing abort flag, for example one set from a Ctrl+C handler.
    #[must_use]
    pub fn with_abort_flag(mut self, abort_flag: Arc<AtomicBool>) -> Self {
        self.abort_flag = abort_flag;
        self
    }

    /// Flag checked between files. Setting it stops the run before the next file.
    #[must_use]
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort_flag)
    }

    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Return to `Idle` after a finished run so another one can start.
    pub fn reset(&mut self) {
        if self.state != RunState::Running {
            self.state = RunState::Idle;
            self.abort_flag.store(false, Ordering::SeqCst);
        }
    }

    /// Run the batch to completion, sending events as files are handled.
    ///
    /// Errors are returned only for problems that stop the whole run:
    /// missing root, unreadable root or log, and failure to write the log.
    /// Per-file failures are recorded in the log instead.
    pub fn run(&mut self, params: &RunParams, events: &Sender<Event>) -> Result<RunSummary> {
        if self.state != RunState::Idle {
            return Err(Ts2Mp4Error::Config(format!("Batch is not idle: {}", self.state)));
        }
        if params.root.as_os_str().is_empty() {
            self.state = RunState::Aborted;
            return Err(Ts2Mp4Error::Config("Please select an input folder".to_string()));
        }

        self.state = RunState::Running;
        match self.execute(params, events) {
            Ok(summary) => {
                self.state = summary.state;
                Ok(summary)
            }
            Err(error) => {
                self.state = RunState::Aborted;
                Err(error)
            }
        }
    }

    fn execute(&self, params: &RunParams, events: &Sender<Event>) -> Result<RunSummary> {
        let emit = |event: Event| {
            // Front end may have gone away, the run still completes
            let _ = events.send(event);
        };

        let root = params.root.as_path();
        let backup_root = params.backup_root();
        let log_path = params.log_path();

        let discovery = find_candidates(root, &params.filter)?;
        for message in discovery.unreadable {
            emit(Event::Warning(format!("Skipped unreadable entry: {message}")));
        }

        let loaded = ConversionLog::load(&log_path, params.malformed_rows)?;
        for message in loaded.skipped_rows {
            emit(Event::Warning(format!("Skipped log row: {message}")));
        }
        let mut log = loaded.log;

        let candidates = discovery.candidates;
        let total = candidates.len();
        let mut summary = RunSummary {
            total,
            ..RunSummary::default()
        };

        emit(Event::Started {
            root: root.to_path_buf(),
            log_path: log_path.clone(),
            mode: params.mode,
            total,
        });
        emit(Event::Progress(progress_percent(0, total)));

        for (index, source) in candidates.iter().enumerate() {
            if self.abort_flag.load(Ordering::SeqCst) {
                summary.state = RunState::Aborted;
                emit(Event::Finished {
                    state: summary.state,
                    processed: summary.processed,
                });
                return Ok(summary);
            }

            let key = crate::path_to_normalized_string(source);
            if log.is_converted(&key) {
                summary.already_converted += 1;
                emit(Event::AlreadyConverted { path: source.clone() });
            } else {
                summary.processed += 1;
                let number = summary.processed;
                match params.mode {
                    Mode::List => emit(Event::Listed {
                        number,
                        path: source.clone(),
                    }),
                    Mode::Convert => {
                        let start = Instant::now();
                        let record = self.convert_file(source, root, &backup_root, number, &emit);
                        match record.status {
                            Status::Success => summary.succeeded += 1,
                            Status::Failed => summary.failed += 1,
                        }
                        log.insert(record.clone());
                        log.save(&log_path)?;
                        emit(Event::FileCompleted {
                            number,
                            record,
                            duration: start.elapsed(),
                        });
                    }
                }
            }

            emit(Event::Progress(progress_percent(index + 1, total)));
        }

        summary.state = match params.mode {
            Mode::List => RunState::ListDone,
            Mode::Convert => RunState::ConvertDone,
        };
        emit(Event::Finished {
            state: summary.state,
            processed: summary.processed,
        });
        Ok(summary)
    }

    /// Convert and archive one file, returning the record describing the outcome.
    fn convert_file(
        &self,
        source: &Path,
        root: &Path,
        backup_root: &Path,
        number: usize,
        emit: &impl Fn(Event),
    ) -> LogRecord {
        let key = crate::path_to_normalized_string(source);
        let destination = destination_path(source);
        let backup = crate::path_to_normalized_string(&archive::backup_path(source, root, backup_root));

        let original_size = match fs::metadata(source) {
            Ok(metadata) => metadata.len(),
            Err(error) => return LogRecord::failed(key, 0, backup, format!("Failed to read file size: {error}")),
        };

        emit(Event::ConversionStarted {
            number,
            path: source.to_path_buf(),
            destination: destination.clone(),
        });

        if let Err(error) = self.remuxer.remux(source, &destination) {
            return LogRecord::failed(key, original_size, backup, error.to_string());
        }

        let converted_size = match fs::metadata(&destination) {
            Ok(metadata) => metadata.len(),
            Err(error) => {
                return LogRecord::failed(
                    key,
                    original_size,
                    backup,
                    format!("Failed to read converted file size: {error}"),
                );
            }
        };

        match archive::archive(source, root, backup_root) {
            Ok(moved) => LogRecord::success(
                key,
                original_size,
                crate::path_to_normalized_string(&destination),
                converted_size,
                crate::path_to_normalized_string(&moved),
            ),
            Err(error) => LogRecord::failed(
                key,
                original_size,
                backup,
                format!("Failed to archive original: {error}"),
            ),
        }
    }
}

impl<R: Remuxer + 'static> Batch<R> {
    /// Run the batch on a dedicated worker thread.
    ///
    /// Events arrive on [`Worker::events`]; the channel closes when the run ends.
    #[must_use]
    pub fn spawn(mut self, params: RunParams) -> Worker {
        let (sender, receiver) = mpsc::channel();
        let handle = std::thread::spawn(move || self.run(&params, &sender));
        Worker {
            events: receiver,
            handle,
        }
    }
}

impl Worker {
    /// Wait for the run to end and return its summary.
    pub fn join(self) -> Result<RunSummary> {
        self.handle
            .join()
            .map_err(|_| Ts2Mp4Error::Worker("Batch worker thread panicked".to_string()))?
    }
}

/// Progress in percent after `done` of `total` candidates.
///
/// Starts at 1 before the first file completes, and is 100 when there is nothing to do.
#[must_use]
pub fn progress_percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        (100.0 * done as f64 / total as f64).max(1.0)
    }
}
