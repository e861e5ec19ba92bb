use std::time::Duration;

use colored::Colorize;

use ts2mp4::conversion_log::{LogRecord, LogSummary, Status};

/// Statistics for a batch run
#[derive(Debug, Default)]
pub struct RunStats {
    pub(crate) files_listed: usize,
    pub(crate) files_converted: usize,
    pub(crate) files_failed: usize,
    pub(crate) files_skipped_converted: usize,
    pub(crate) warnings: usize,
    pub(crate) total_original_size: u64,
    pub(crate) total_converted_size: u64,
    pub(crate) total_duration: Duration,
}

impl RunStats {
    pub(crate) fn add_record(&mut self, record: &LogRecord, duration: Duration) {
        self.total_duration += duration;
        match record.status {
            Status::Success => {
                self.files_converted += 1;
                self.total_original_size += record.original_size;
                self.total_converted_size += record.converted_size.unwrap_or_default();
            }
            Status::Failed => self.files_failed += 1,
        }
    }

    pub(crate) const fn add_listed(&mut self) {
        self.files_listed += 1;
    }

    pub(crate) const fn add_skipped(&mut self) {
        self.files_skipped_converted += 1;
    }

    pub(crate) const fn add_warning(&mut self) {
        self.warnings += 1;
    }

    #[allow(clippy::cast_possible_wrap)]
    pub(crate) const fn size_difference(&self) -> i64 {
        self.total_original_size as i64 - self.total_converted_size as i64
    }

    pub(crate) fn print_summary(&self) {
        println!("{}", "\n--- Conversion Summary ---".bold().magenta());
        if self.files_listed > 0 {
            println!("Files to convert:       {}", self.files_listed);
        }
        println!("Files converted:        {}", self.files_converted);
        println!(
            "Files failed:           {}",
            if self.files_failed > 0 {
                self.files_failed.to_string().red()
            } else {
                "0".normal()
            }
        );
        println!("Already converted:      {}", self.files_skipped_converted);
        if self.warnings > 0 {
            println!("Warnings:               {}", self.warnings.to_string().yellow());
        }
        println!();

        if self.files_converted > 0 {
            println!(
                "Total original size:    {}",
                ts2mp4::format_size(self.total_original_size)
            );
            println!(
                "Total converted size:   {}",
                ts2mp4::format_size(self.total_converted_size)
            );
            let difference = self.size_difference();
            if difference >= 0 {
                println!("Size reduced by:        {}", ts2mp4::format_size(difference.unsigned_abs()));
            } else {
                println!("Size increased by:      {}", ts2mp4::format_size(difference.unsigned_abs()));
            }
        }

        println!(
            "Total time:             {}",
            ts2mp4::format_duration(self.total_duration)
        );
    }
}

/// Print totals of an existing conversion log.
pub fn print_log_summary(summary: &LogSummary) {
    println!("{}", "--- Conversion Log ---".bold().magenta());
    println!("Successful:             {}", summary.success.to_string().green());
    println!(
        "Failed:                 {}",
        if summary.failed > 0 {
            summary.failed.to_string().red()
        } else {
            "0".normal()
        }
    );
    if summary.success > 0 {
        println!(
            "Total original size:    {}",
            ts2mp4::format_size(summary.original_size)
        );
        println!(
            "Total converted size:   {}",
            ts2mp4::format_size(summary.converted_size)
        );
    }
}
