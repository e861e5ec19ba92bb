use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use ts2mp4::batch::{Batch, Mode, RunState};
use ts2mp4::conversion_log::{ConversionLog, Status};
use ts2mp4::converter::FfmpegRemuxer;
use ts2mp4::event::Event;
use ts2mp4::{print_error, print_warning};

use crate::Ts2Mp4Args;
use crate::config::{Config, Ts2Mp4Config};
use crate::logger::FileLogger;
use crate::stats::{self, RunStats};

const PROGRESS_BAR_CHARS: &str = "=>-";
const PROGRESS_BAR_TEMPLATE: &str = "[{elapsed_precise}] {bar:80.magenta/blue} {pos}%";

/// Terminal front end for a batch run.
pub struct TsConvert {
    config: Config,
    logger: FileLogger,
}

impl TsConvert {
    /// Create a new batch front end from command line arguments.
    pub fn new(args: Ts2Mp4Args) -> Result<Self> {
        let config = Config::try_from_args(args, user_config())?;
        let logger = FileLogger::new()?;
        Ok(Self { config, logger })
    }

    /// Run discovery and conversion on a worker thread, printing events as they arrive.
    pub fn run(mut self) -> Result<()> {
        self.logger.log_init(&self.config);

        // Set up Ctrl+C handler for graceful abort
        let abort_flag = Arc::new(AtomicBool::new(false));
        let abort_flag_handler = Arc::clone(&abort_flag);

        ctrlc::set_handler(move || {
            if abort_flag_handler.load(Ordering::SeqCst) {
                // Second Ctrl+C - force exit
                std::process::exit(130);
            }
            println!("\n{}", "Received Ctrl+C, finishing current file...".yellow().bold());
            abort_flag_handler.store(true, Ordering::SeqCst);
        })
        .context("Failed to set Ctrl+C handler")?;

        let batch = Batch::new(FfmpegRemuxer::new(&self.config.ffmpeg)).with_abort_flag(abort_flag);
        let worker = batch.spawn(self.config.run_params());

        let progress_bar = ProgressBar::new(100);
        progress_bar.set_style(
            ProgressStyle::with_template(PROGRESS_BAR_TEMPLATE)?.progress_chars(PROGRESS_BAR_CHARS),
        );

        let mut stats = RunStats::default();
        let mut final_state = RunState::Idle;
        for event in &worker.events {
            if let Event::Finished { state, .. } = &event {
                final_state = *state;
            }
            self.handle_event(event, &progress_bar, &mut stats);
        }
        progress_bar.finish_and_clear();

        let summary = worker.join()?;
        self.logger.log_stats(&stats);

        if final_state == RunState::Aborted {
            println!("\n{}", "Aborted by user".bold().red());
        }
        stats.print_summary();

        if summary.state == RunState::ListDone && summary.processed > 0 {
            println!("\nRun with {} to convert the listed files", "--convert".bold());
        }
        if summary.state == RunState::ConvertDone && summary.failed == 0 {
            println!("{}", "Conversion completed".green().bold());
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event, progress_bar: &ProgressBar, stats: &mut RunStats) {
        match event {
            Event::Started {
                root,
                log_path,
                mode,
                total,
            } => {
                progress_bar.println(format!(
                    "{} {} ({} file{})",
                    match mode {
                        Mode::List => "Listing",
                        Mode::Convert => "Converting",
                    }
                    .bold(),
                    root.display(),
                    total,
                    if total == 1 { "" } else { "s" }
                ));
                if self.config.verbose {
                    progress_bar.println(format!("Log folder: {}", log_path.parent().unwrap_or(&root).display()));
                    progress_bar.println(format!(
                        "Forbidden folders: {}",
                        self.config.filter.display_names().join(", ")
                    ));
                }
            }
            Event::Warning(message) => {
                stats.add_warning();
                self.logger.log_warning(&message);
                progress_bar.suspend(|| print_warning!("{message}"));
            }
            Event::AlreadyConverted { path } => {
                stats.add_skipped();
                if self.config.verbose {
                    progress_bar.println(format!(
                        "{}",
                        format!("Already converted: {}", self.relative(&path)).dimmed()
                    ));
                }
            }
            Event::Listed { number, path } => {
                stats.add_listed();
                progress_bar.println(format!("{number}. {}", path.display()));
            }
            Event::ConversionStarted {
                number,
                path,
                destination,
            } => {
                self.logger.log_start(&path, &number.to_string());
                if self.config.verbose {
                    progress_bar.println(format!(
                        "{number}. {} -> {}",
                        self.relative(&path),
                        self.relative(&destination)
                    ));
                }
            }
            Event::FileCompleted {
                number,
                record,
                duration,
            } => {
                self.logger.log_result(&record, &number.to_string(), duration);
                stats.add_record(&record, duration);
                match record.status {
                    Status::Success => progress_bar.println(format!(
                        "{number}. {} - {}",
                        "SUCCESS".green(),
                        record.source
                    )),
                    Status::Failed => {
                        progress_bar.println(format!("{number}. {} - {}", "FAILED".red(), record.source));
                        progress_bar.suspend(|| print_error!("{}", record.error.as_deref().unwrap_or_default()));
                    }
                }
            }
            Event::Progress(percent) => progress_bar.set_position(percent.round() as u64),
            Event::Finished { processed, .. } => {
                progress_bar.println(format!("Processed {processed} files."));
            }
        }
    }

    fn relative(&self, path: &std::path::Path) -> String {
        ts2mp4::get_relative_path_or_filename(path, &self.config.path)
    }
}

/// Print the records and totals of the conversion log under the given folder.
pub fn show_log(args: Ts2Mp4Args) -> Result<()> {
    let config = Config::try_from_args(args, user_config())?;
    let log_path = ConversionLog::path_for_root(&config.path);
    if !log_path.exists() {
        println!("No conversion log found in {}", config.path.display());
        return Ok(());
    }

    let loaded = ConversionLog::load(&log_path, config.malformed_rows)?;
    for message in &loaded.skipped_rows {
        print_warning!("Skipped log row: {message}");
    }
    if config.verbose {
        println!("{}", format!("Log: {}", log_path.display()).bold());
    }

    for record in &loaded.log {
        let status = match record.status {
            Status::Success => "SUCCESS".green(),
            Status::Failed => "FAILED".red(),
        };
        let detail = match record.status {
            Status::Success => format!(
                "{} -> {}",
                ts2mp4::format_size(record.original_size),
                ts2mp4::format_size(record.converted_size.unwrap_or_default())
            ),
            Status::Failed => record.error.clone().unwrap_or_default(),
        };
        println!(
            "[{status}] {} {} | {detail}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            ts2mp4::get_relative_path_or_filename(std::path::Path::new(&record.source), &config.path),
        );
    }
    println!();
    stats::print_log_summary(&loaded.log.summary());
    Ok(())
}

/// Read the user config, falling back to defaults when it is broken.
fn user_config() -> Ts2Mp4Config {
    Ts2Mp4Config::get_user_config().unwrap_or_else(|error| {
        print_error!("{error}");
        Ts2Mp4Config::default()
    })
}
