mod config;
mod convert;
mod logger;
mod stats;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use crate::convert::TsConvert;

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Remux Transport Stream (.ts) files to MP4 with ffmpeg, resumable across runs"
)]
pub(crate) struct Ts2Mp4Args {
    /// Optional input directory
    #[arg(value_hint = clap::ValueHint::DirPath)]
    path: Option<PathBuf>,

    /// Convert files instead of only listing them
    #[arg(short, long)]
    convert: bool,

    /// Skip paths containing the given substring
    #[arg(short = 'e', long, num_args = 1, action = clap::ArgAction::Append, name = "EXCLUDE")]
    exclude: Vec<String>,

    /// Path to the ffmpeg executable
    #[arg(short, long, name = "FFMPEG", value_hint = clap::ValueHint::ExecutablePath)]
    ffmpeg: Option<PathBuf>,

    /// Skip malformed conversion log rows instead of failing
    #[arg(short = 'k', long)]
    skip_malformed: bool,

    /// Show the conversion log of the input directory
    #[arg(short, long, conflicts_with = "convert")]
    show_log: bool,

    /// Generate shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    completion: Option<Shell>,

    /// Print verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Ts2Mp4Args::parse();
    if let Some(ref shell) = args.completion {
        ts2mp4::generate_shell_completion(*shell, Ts2Mp4Args::command(), true, env!("CARGO_BIN_NAME"))
    } else if args.show_log {
        convert::show_log(args)
    } else {
        TsConvert::new(args)?.run()
    }
}
