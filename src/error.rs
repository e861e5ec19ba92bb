use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a batch run or a log operation.
#[derive(Error, Debug)]
pub enum Ts2Mp4Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed conversion log row {line} in '{}': {message}", path.display())]
    Parse { path: PathBuf, line: u64, message: String },

    #[error("{0}")]
    Worker(String),
}

/// Failure to remux a single file.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}{}", stderr_suffix(.stderr))]
    ExitStatus {
        program: String,
        code: i32,
        stderr: Option<String>,
    },

    #[error("{program} finished but output file is missing: {}", path.display())]
    MissingOutput { program: String, path: PathBuf },
}

impl Ts2Mp4Error {
    /// Wrap an IO error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn stderr_suffix(stderr: &Option<String>) -> String {
    stderr.as_ref().map_or_else(String::new, |line| format!(": {line}"))
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, Ts2Mp4Error>;
