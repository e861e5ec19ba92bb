//! External stream-copy remux of a single file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::error::ConversionError;

/// Default converter executable, looked up from `PATH`.
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Suffix added to the file stem of converted files.
pub const TARGET_SUFFIX: &str = "_ts2mp4";

/// Extension of converted files.
pub const TARGET_EXTENSION: &str = "mp4";

/// Copy only, no re-encoding. Existing output is overwritten.
const FFMPEG_DEFAULT_ARGS: &[&str] = &["-hide_banner", "-nostdin", "-loglevel", "error", "-y"];

/// Changes the container of a single file.
///
/// Called from the batch worker thread, one file at a time.
pub trait Remuxer: Send {
    /// Remux `source` into `destination`, blocking until done.
    fn remux(&self, source: &Path, destination: &Path) -> Result<(), ConversionError>;
}

/// Remux with `ffmpeg -vcodec copy`.
#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    program: PathBuf,
}

impl FfmpegRemuxer {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build the ffmpeg command for the given files.
    #[must_use]
    pub fn command(&self, source: &Path, destination: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(FFMPEG_DEFAULT_ARGS)
            .arg("-i")
            .arg(source)
            .args(["-vcodec", "copy"])
            .arg(destination);
        cmd
    }

    fn program_name(&self) -> String {
        crate::path_to_string(&self.program)
    }
}

impl Default for FfmpegRemuxer {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG)
    }
}

impl Remuxer for FfmpegRemuxer {
    fn remux(&self, source: &Path, destination: &Path) -> Result<(), ConversionError> {
        let mut cmd = self.command(source, destination);
        let output = run_command_quiet(&mut cmd).map_err(|source| ConversionError::Launch {
            program: self.program_name(),
            source,
        })?;

        if !output.status.success() {
            // Don't leave a truncated file behind
            let _ = fs::remove_file(destination);
            return Err(ConversionError::ExitStatus {
                program: self.program_name(),
                code: output.status.code().unwrap_or(-1),
                stderr: last_line(&output.stderr),
            });
        }

        if !destination.is_file() {
            return Err(ConversionError::MissingOutput {
                program: self.program_name(),
                path: destination.to_path_buf(),
            });
        }

        Ok(())
    }
}

/// Output path for a source file: `<stem>_ts2mp4.mp4` in the same directory.
///
/// ```rust
/// use std::path::Path;
/// use ts2mp4::converter::destination_path;
///
/// let path = destination_path(Path::new("/videos/match.final.ts"));
/// assert_eq!(path, Path::new("/videos/match.final_ts2mp4.mp4"));
/// ```
#[must_use]
pub fn destination_path(source: &Path) -> PathBuf {
    let stem = crate::path_to_file_stem_string(source);
    source.with_file_name(format!("{stem}{TARGET_SUFFIX}.{TARGET_EXTENSION}"))
}

/// Run a command without a console window and without inheriting Ctrl+C.
///
/// Output is captured instead of shown; stdin is closed.
fn run_command_quiet(cmd: &mut Command) -> std::io::Result<Output> {
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
    }
    #[cfg(unix)]
    {
        // Set process group to 0 to prevent SIGINT propagation
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
}

/// Last non-empty line of the captured stderr.
fn last_line(stderr: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn destination_replaces_only_the_extension() {
        assert_eq!(
            destination_path(Path::new("/videos/clip1.ts")),
            Path::new("/videos/clip1_ts2mp4.mp4")
        );
        // The ".ts" inside the name must survive
        assert_eq!(
            destination_path(Path::new("/videos/stats.tsunami.ts")),
            Path::new("/videos/stats.tsunami_ts2mp4.mp4")
        );
    }

    #[test]
    fn command_uses_stream_copy_and_overwrite() {
        let remuxer = FfmpegRemuxer::default();
        let cmd = remuxer.command(Path::new("in.ts"), Path::new("out.mp4"));
        let args: Vec<String> = cmd.get_args().map(|arg| arg.to_string_lossy().to_string()).collect();

        assert_eq!(cmd.get_program(), "ffmpeg");
        assert!(args.contains(&"-y".to_string()));
        let vcodec = args.iter().position(|arg| arg == "-vcodec").expect("missing -vcodec");
        assert_eq!(args[vcodec + 1], "copy");
        let input = args.iter().position(|arg| arg == "-i").expect("missing -i");
        assert_eq!(args[input + 1], "in.ts");
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let remuxer = FfmpegRemuxer::new(dir.path().join("no-such-ffmpeg"));
        let result = remuxer.remux(&dir.path().join("a.ts"), &dir.path().join("a_ts2mp4.mp4"));
        assert!(matches!(result, Err(ConversionError::Launch { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let remuxer = FfmpegRemuxer::new("false");
        let result = remuxer.remux(&dir.path().join("a.ts"), &dir.path().join("a_ts2mp4.mp4"));
        assert!(matches!(result, Err(ConversionError::ExitStatus { code: 1, .. })));
    }

    #[cfg(unix)]
    #[test]
    fn success_without_output_is_an_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let remuxer = FfmpegRemuxer::new("true");
        let result = remuxer.remux(&dir.path().join("a.ts"), &dir.path().join("a_ts2mp4.mp4"));
        assert!(matches!(result, Err(ConversionError::MissingOutput { .. })));
    }

    #[test]
    fn last_line_skips_trailing_blank_lines() {
        assert_eq!(
            last_line(b"first\nInvalid data found\n\n"),
            Some("Invalid data found".to_string())
        );
        assert_eq!(last_line(b""), None);
    }
}
