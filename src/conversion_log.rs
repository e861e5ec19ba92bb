//! Durable CSV log of per-file conversion outcomes.
//!
//! The log maps each source path to its latest [`LogRecord`].
//! It is rewritten in full after every processed file,
//! so an interrupted run keeps every record that completed before the interruption.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::error::{Result, Ts2Mp4Error};

/// Directory under the input root holding the log file and archived originals.
pub const LOG_DIR_NAME: &str = "TS_to_MP4_Logs";

/// Log file name inside [`LOG_DIR_NAME`].
pub const LOG_FILE_NAME: &str = "conversion_log.csv";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Column names of the log file, in order.
pub const HEADERS: [&str; 8] = [
    "Original TS File",
    "Original Size",
    "Status",
    "Converted MP4 File",
    "New Size",
    "Timestamp",
    "Backup TS File",
    "Error Message",
];

/// Outcome of processing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failed,
}

/// What to do with rows that cannot be parsed when loading the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedRowPolicy {
    /// Abort loading with a parse error.
    #[default]
    Fail,
    /// Drop the row and report it as a warning.
    Skip,
}

/// Latest known outcome for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Source file path, also the log key.
    pub source: String,
    /// Source size in bytes, measured before conversion.
    pub original_size: u64,
    pub status: Status,
    /// Converted MP4 path, only for successful conversions.
    pub destination: Option<String>,
    /// Converted size in bytes, only for successful conversions.
    pub converted_size: Option<u64>,
    pub timestamp: NaiveDateTime,
    /// Where the source is moved to under the backup root.
    pub backup: String,
    /// Failure reason, only for failed conversions.
    pub error: Option<String>,
}

/// In-memory conversion log keyed by source path, keeping insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionLog {
    records: Vec<LogRecord>,
    index: HashMap<String, usize>,
}

/// A loaded log together with the rows that were skipped.
#[derive(Debug, Default)]
pub struct LoadedLog {
    pub log: ConversionLog,
    /// Descriptions of malformed rows dropped with [`MalformedRowPolicy::Skip`].
    pub skipped_rows: Vec<String>,
}

/// Totals over all records in a log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogSummary {
    pub success: usize,
    pub failed: usize,
    pub original_size: u64,
    pub converted_size: u64,
}

/// One CSV row as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
struct LogRow {
    #[serde(rename = "Original TS File")]
    source: String,
    #[serde(rename = "Original Size")]
    original_size: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Converted MP4 File")]
    destination: Option<String>,
    #[serde(rename = "New Size")]
    converted_size: Option<String>,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Backup TS File")]
    backup: String,
    #[serde(rename = "Error Message")]
    error: Option<String>,
}

impl Status {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }

    fn parse(value: &str) -> std::result::Result<Self, String> {
        match value.trim() {
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl LogRecord {
    /// Record for a file that was converted and archived.
    #[must_use]
    pub fn success(
        source: impl Into<String>,
        original_size: u64,
        destination: impl Into<String>,
        converted_size: u64,
        backup: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            original_size,
            status: Status::Success,
            destination: Some(destination.into()),
            converted_size: Some(converted_size),
            timestamp: now(),
            backup: backup.into(),
            error: None,
        }
    }

    /// Record for a file that could not be converted or archived.
    #[must_use]
    pub fn failed(
        source: impl Into<String>,
        original_size: u64,
        backup: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            original_size,
            status: Status::Failed,
            destination: None,
            converted_size: None,
            timestamp: now(),
            backup: backup.into(),
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    fn to_row(&self) -> LogRow {
        LogRow {
            source: self.source.clone(),
            original_size: format_megabytes(self.original_size),
            status: self.status.to_string(),
            destination: self.destination.clone(),
            converted_size: self.converted_size.map(format_megabytes),
            timestamp: self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            backup: self.backup.clone(),
            error: self.error.clone(),
        }
    }

    fn from_row(row: LogRow) -> std::result::Result<Self, String> {
        if row.source.trim().is_empty() {
            return Err("empty source path".to_string());
        }
        let status = Status::parse(&row.status)?;
        let original_size = parse_megabytes(&row.original_size)?;
        let converted_size = row.converted_size.as_deref().map(parse_megabytes).transpose()?;
        let timestamp = NaiveDateTime::parse_from_str(row.timestamp.trim(), TIMESTAMP_FORMAT)
            .map_err(|e| format!("invalid timestamp '{}': {e}", row.timestamp))?;

        match status {
            Status::Success => {
                if row.destination.is_none() || converted_size.is_none() {
                    return Err("successful row is missing converted file or size".to_string());
                }
            }
            Status::Failed => {
                if row.destination.is_some() {
                    return Err("failed row has a converted file".to_string());
                }
                if row.error.is_none() {
                    return Err("failed row is missing the error message".to_string());
                }
            }
        }

        Ok(Self {
            source: row.source,
            original_size,
            status,
            destination: row.destination,
            converted_size,
            timestamp,
            backup: row.backup,
            error: row.error,
        })
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Status::Success => write!(
                f,
                "{} {} -> {} ({} -> {})",
                self.timestamp.format("%Y-%m-%d %H:%M:%S"),
                self.source,
                self.destination.as_deref().unwrap_or_default(),
                crate::format_size(self.original_size),
                crate::format_size(self.converted_size.unwrap_or_default())
            ),
            Status::Failed => write!(
                f,
                "{} {} | {}",
                self.timestamp.format("%Y-%m-%d %H:%M:%S"),
                self.source,
                self.error.as_deref().unwrap_or_default()
            ),
        }
    }
}

impl ConversionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the log file for the given input root.
    #[must_use]
    pub fn path_for_root(root: &Path) -> PathBuf {
        root.join(LOG_DIR_NAME).join(LOG_FILE_NAME)
    }

    /// Read the log from disk. A missing file gives an empty log.
    pub fn load(path: &Path, policy: MalformedRowPolicy) -> Result<LoadedLog> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(LoadedLog::default()),
            Err(error) => return Err(Ts2Mp4Error::io(path, error)),
        };

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();

        let mut loaded = LoadedLog::default();
        for result in reader.records() {
            let parsed = result.map_err(|e| csv_error(path, e)).and_then(|record| {
                let line = record.position().map_or(0, csv::Position::line);
                record
                    .deserialize::<LogRow>(Some(&headers))
                    .map_err(|e| e.to_string())
                    .and_then(LogRecord::from_row)
                    .map_err(|message| Ts2Mp4Error::Parse {
                        path: path.to_path_buf(),
                        line,
                        message,
                    })
            });

            match parsed {
                Ok(record) => {
                    loaded.log.insert(record);
                }
                Err(error @ Ts2Mp4Error::Parse { .. }) if policy == MalformedRowPolicy::Skip => {
                    loaded.skipped_rows.push(error.to_string());
                }
                Err(error) => return Err(error),
            }
        }

        Ok(loaded)
    }

    /// Write the whole log, replacing the file atomically.
    ///
    /// The rows go to a temporary file in the same directory which is then renamed over the log,
    /// so a crash mid-write leaves the previous version intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| Ts2Mp4Error::io(parent, e))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(|e| Ts2Mp4Error::io(parent, e))?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(temp_file.as_file_mut());
            writer.write_record(HEADERS).map_err(|e| csv_error(path, e))?;
            for record in &self.records {
                writer.serialize(record.to_row()).map_err(|e| csv_error(path, e))?;
            }
            writer.flush().map_err(|e| Ts2Mp4Error::io(path, e))?;
        }
        temp_file.as_file().sync_all().map_err(|e| Ts2Mp4Error::io(path, e))?;
        temp_file.persist(path).map_err(|e| Ts2Mp4Error::io(path, e.error))?;
        Ok(())
    }

    /// Insert or replace the record for its source path.
    /// Returns the previous record if there was one.
    pub fn insert(&mut self, record: LogRecord) -> Option<LogRecord> {
        if let Some(&position) = self.index.get(&record.source) {
            Some(std::mem::replace(&mut self.records[position], record))
        } else {
            self.index.insert(record.source.clone(), self.records.len());
            self.records.push(record);
            None
        }
    }

    #[must_use]
    pub fn get(&self, source: &str) -> Option<&LogRecord> {
        self.index.get(source).map(|&position| &self.records[position])
    }

    /// Returns true if the source has a successful record.
    #[must_use]
    pub fn is_converted(&self, source: &str) -> bool {
        self.get(source).is_some_and(LogRecord::is_success)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count records by status and sum the sizes of successful conversions.
    #[must_use]
    pub fn summary(&self) -> LogSummary {
        self.records.iter().fold(LogSummary::default(), |mut summary, record| {
            match record.status {
                Status::Success => {
                    summary.success += 1;
                    summary.original_size += record.original_size;
                    summary.converted_size += record.converted_size.unwrap_or_default();
                }
                Status::Failed => summary.failed += 1,
            }
            summary
        })
    }
}

/// Format a byte count as `"<float> MB"`.
///
/// Dividing by a power of two is exact, so the shortest float representation
/// parses back to the same number of bytes.
#[must_use]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:?} MB", bytes as f64 / BYTES_PER_MB)
}

/// Parse a `"<float> MB"` string back to bytes.
pub fn parse_megabytes(value: &str) -> std::result::Result<u64, String> {
    let number = value.trim().strip_suffix("MB").unwrap_or(value).trim();
    let megabytes: f64 = number
        .parse()
        .map_err(|e| format!("invalid size '{value}': {e}"))?;
    if !megabytes.is_finite() || megabytes < 0.0 {
        return Err(format!("invalid size '{value}'"));
    }
    Ok((megabytes * BYTES_PER_MB).round() as u64)
}

fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(6)
}

fn csv_error(path: &Path, error: csv::Error) -> Ts2Mp4Error {
    let line = error.position().map_or(0, csv::Position::line);
    match error.into_kind() {
        csv::ErrorKind::Io(source) => Ts2Mp4Error::io(path, source),
        kind => Ts2Mp4Error::Parse {
            path: path.to_path_buf(),
            line,
            message: format!("{kind:?}"),
        },
    }
}

impl<'a> IntoIterator for &'a ConversionLog {
    type Item = &'a LogRecord;
    type IntoIter = std::slice::Iter<'a, LogRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::tempdir;

    fn success_record(source: &str) -> LogRecord {
        LogRecord::success(
            source,
            52_428_800,
            source.replace(".ts", "_ts2mp4.mp4"),
            41_943_040,
            format!("/videos/{LOG_DIR_NAME}/clip.ts"),
        )
    }

    fn failed_record(source: &str) -> LogRecord {
        LogRecord::failed(source, 1_234_567, "/videos/TS_to_MP4_Logs/bad.ts", "ffmpeg exited with code 1")
    }

    #[test]
    fn missing_file_loads_empty_log() {
        let dir = tempdir().expect("Failed to create temp dir");
        let loaded = ConversionLog::load(&dir.path().join("none.csv"), MalformedRowPolicy::Fail)
            .expect("Failed to load");
        assert!(loaded.log.is_empty());
        assert!(loaded.skipped_rows.is_empty());
    }

    #[test]
    fn save_and_load_keeps_records() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(LOG_DIR_NAME).join(LOG_FILE_NAME);

        let mut log = ConversionLog::new();
        log.insert(success_record("/videos/clip.ts"));
        log.insert(failed_record("/videos/bad.ts"));
        log.save(&path).expect("Failed to save");

        let loaded = ConversionLog::load(&path, MalformedRowPolicy::Fail).expect("Failed to load");
        assert_eq!(loaded.log, log);
        assert!(loaded.log.is_converted("/videos/clip.ts"));
        assert!(!loaded.log.is_converted("/videos/bad.ts"));
    }

    #[test]
    fn resave_is_byte_identical() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(LOG_FILE_NAME);

        let mut log = ConversionLog::new();
        log.insert(success_record("/videos/a, with comma.ts"));
        log.insert(failed_record("/videos/\"quoted\".ts"));
        log.save(&path).expect("Failed to save");
        let first = std::fs::read_to_string(&path).expect("Failed to read");

        for _ in 0..2 {
            let loaded = ConversionLog::load(&path, MalformedRowPolicy::Fail).expect("Failed to load");
            loaded.log.save(&path).expect("Failed to save");
        }
        let second = std::fs::read_to_string(&path).expect("Failed to read");
        assert_eq!(first, second);
    }

    #[test]
    fn empty_log_writes_header_only() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(LOG_FILE_NAME);
        ConversionLog::new().save(&path).expect("Failed to save");

        let content = std::fs::read_to_string(&path).expect("Failed to read");
        assert_eq!(content.trim_end(), HEADERS.join(","));
    }

    #[test]
    fn insert_replaces_existing_record_in_place() {
        let mut log = ConversionLog::new();
        log.insert(failed_record("/videos/a.ts"));
        log.insert(failed_record("/videos/b.ts"));
        let previous = log.insert(success_record("/videos/a.ts"));

        assert!(previous.is_some_and(|record| record.status == Status::Failed));
        assert_eq!(log.len(), 2);
        let sources: Vec<&str> = log.iter().map(|record| record.source.as_str()).collect();
        assert_eq!(sources, vec!["/videos/a.ts", "/videos/b.ts"]);
        assert!(log.is_converted("/videos/a.ts"));
    }

    #[test]
    fn megabyte_format_matches_log_style() {
        assert_eq!(format_megabytes(1_048_576), "1.0 MB");
        assert_eq!(format_megabytes(1_572_864), "1.5 MB");
        assert_eq!(parse_megabytes("1.5 MB"), Ok(1_572_864));
        assert_eq!(parse_megabytes(&format_megabytes(123_456_789)), Ok(123_456_789));
        assert!(parse_megabytes("lots MB").is_err());
        assert!(parse_megabytes("-1.0 MB").is_err());
    }

    fn write_log_with_bad_row(path: &Path) {
        let mut log = ConversionLog::new();
        log.insert(success_record("/videos/good.ts"));
        log.save(path).expect("Failed to save");
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .expect("Failed to open");
        writeln!(file, "/videos/broken.ts,ten MB,Maybe,,,yesterday,,").expect("Failed to write");
    }

    #[test]
    fn malformed_row_fails_by_default() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(LOG_FILE_NAME);
        write_log_with_bad_row(&path);

        let result = ConversionLog::load(&path, MalformedRowPolicy::Fail);
        assert!(matches!(result, Err(Ts2Mp4Error::Parse { line: 3, .. })));
    }

    #[test]
    fn malformed_row_is_skipped_with_policy() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(LOG_FILE_NAME);
        write_log_with_bad_row(&path);

        let loaded = ConversionLog::load(&path, MalformedRowPolicy::Skip).expect("Failed to load");
        assert_eq!(loaded.log.len(), 1);
        assert_eq!(loaded.skipped_rows.len(), 1);
        assert!(loaded.log.is_converted("/videos/good.ts"));
    }

    #[test]
    fn wrong_field_count_is_a_parse_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(LOG_FILE_NAME);
        std::fs::write(&path, format!("{}\n/videos/a.ts,1.0 MB\n", HEADERS.join(","))).expect("Failed to write");

        assert!(matches!(
            ConversionLog::load(&path, MalformedRowPolicy::Fail),
            Err(Ts2Mp4Error::Parse { .. })
        ));
        let loaded = ConversionLog::load(&path, MalformedRowPolicy::Skip).expect("Failed to load");
        assert!(loaded.log.is_empty());
    }

    #[test]
    fn success_row_without_destination_is_rejected() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(LOG_FILE_NAME);
        std::fs::write(
            &path,
            format!(
                "{}\n/videos/a.ts,1.0 MB,Success,,,2024-05-01 12:00:00.000000,/videos/TS_to_MP4_Logs/a.ts,\n",
                HEADERS.join(",")
            ),
        )
        .expect("Failed to write");

        assert!(ConversionLog::load(&path, MalformedRowPolicy::Fail).is_err());
    }

    #[test]
    fn summary_counts_statuses() {
        let mut log = ConversionLog::new();
        log.insert(success_record("/videos/a.ts"));
        log.insert(success_record("/videos/b.ts"));
        log.insert(failed_record("/videos/c.ts"));

        let summary = log.summary();
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.original_size, 2 * 52_428_800);
        assert_eq!(summary.converted_size, 2 * 41_943_040);
    }
}
