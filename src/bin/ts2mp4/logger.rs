use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;

use ts2mp4::conversion_log::{LogRecord, Status};

use crate::config::Config;
use crate::stats::RunStats;

/// Simple file logger for a batch run with buffered writes
pub struct FileLogger {
    writer: BufWriter<File>,
}

impl FileLogger {
    /// Create a new file logger, writing to ~/logs/ts2mp4/ts2mp4_<timestamp>.log
    pub(crate) fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        let log_dir = home_dir.join("logs").join(env!("CARGO_PKG_NAME"));

        // Create log directory if it doesn't exist
        if !log_dir.exists() {
            fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
        }

        let log_path = log_dir.join(format!(
            "{}_{}.log",
            env!("CARGO_PKG_NAME"),
            Local::now().format("%Y-%m-%d_%H-%M-%S")
        ));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Log when starting the program
    pub(crate) fn log_init(&mut self, config: &Config) {
        let _ = writeln!(
            self.writer,
            "[{}] INIT \"{}\"",
            Self::timestamp(),
            config.path.display()
        );
        let _ = writeln!(self.writer, "  mode: {}", config.mode);
        let _ = writeln!(self.writer, "  ffmpeg: {}", config.ffmpeg.display());
        let _ = writeln!(self.writer, "  forbidden: {:?}", config.filter.substrings());
        let _ = writeln!(self.writer, "  malformed_rows: {:?}", config.malformed_rows);
        let _ = writeln!(self.writer, "  verbose: {}", config.verbose);
        let _ = self.writer.flush();
    }

    /// Log when starting a conversion
    pub(crate) fn log_start(&mut self, file_path: &Path, file_index: &str) {
        let _ = writeln!(
            self.writer,
            "[{}] START   {} - \"{}\"",
            Self::timestamp(),
            file_index,
            file_path.display(),
        );
        let _ = self.writer.flush();
    }

    /// Log the outcome of a conversion
    pub(crate) fn log_result(&mut self, record: &LogRecord, file_index: &str, duration: Duration) {
        let duration_str = ts2mp4::format_duration(duration);
        let _ = match record.status {
            Status::Success => writeln!(
                self.writer,
                "[{}] SUCCESS {} - \"{}\" | Time: {} | {} -> {}",
                Self::timestamp(),
                file_index,
                record.source,
                duration_str,
                ts2mp4::format_size(record.original_size),
                ts2mp4::format_size(record.converted_size.unwrap_or_default())
            ),
            Status::Failed => writeln!(
                self.writer,
                "[{}] ERROR   {} - \"{}\" | {}",
                Self::timestamp(),
                file_index,
                record.source,
                record.error.as_deref().unwrap_or_default()
            ),
        };
        let _ = self.writer.flush();
    }

    /// Log a non-fatal warning
    pub(crate) fn log_warning(&mut self, message: &str) {
        let _ = writeln!(self.writer, "[{}] WARNING {message}", Self::timestamp());
        let _ = self.writer.flush();
    }

    /// Log final statistics
    pub(crate) fn log_stats(&mut self, stats: &RunStats) {
        let _ = writeln!(self.writer, "[{}] STATISTICS", Self::timestamp());
        let _ = writeln!(self.writer, "  Files listed:    {}", stats.files_listed);
        let _ = writeln!(self.writer, "  Files converted: {}", stats.files_converted);
        let _ = writeln!(self.writer, "  Files failed:    {}", stats.files_failed);
        let _ = writeln!(self.writer, "  Files skipped:   {}", stats.files_skipped_converted);

        if stats.files_converted > 0 {
            let _ = writeln!(
                self.writer,
                "  Total original size:  {}",
                ts2mp4::format_size(stats.total_original_size)
            );
            let _ = writeln!(
                self.writer,
                "  Total converted size: {}",
                ts2mp4::format_size(stats.total_converted_size)
            );
        }

        let _ = writeln!(
            self.writer,
            "  Total time: {}",
            ts2mp4::format_duration(stats.total_duration)
        );
        let _ = writeln!(self.writer, "[{}] END", Self::timestamp());
        let _ = self.writer.flush();
    }
}
