//! Configuration for `ts2mp4`.
//!
//! Handles reading configuration from CLI arguments and the user config file.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use itertools::Itertools;
use serde::Deserialize;

use ts2mp4::batch::{Mode, RunParams};
use ts2mp4::conversion_log::MalformedRowPolicy;
use ts2mp4::converter::DEFAULT_FFMPEG;
use ts2mp4::filter::PathFilter;

use crate::Ts2Mp4Args;

/// Config from the user config file.
#[derive(Debug, Default, Deserialize)]
pub struct Ts2Mp4Config {
    #[serde(default)]
    convert: bool,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    ffmpeg: Option<PathBuf>,
    #[serde(default)]
    skip_malformed_rows: bool,
    #[serde(default)]
    verbose: bool,
}

/// Wrapper needed for parsing the config file section.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    ts2mp4: Ts2Mp4Config,
}

/// Final config combined from CLI arguments and user config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) ffmpeg: PathBuf,
    pub(crate) filter: PathFilter,
    pub(crate) malformed_rows: MalformedRowPolicy,
    pub(crate) mode: Mode,
    pub(crate) path: PathBuf,
    pub(crate) verbose: bool,
}

impl Ts2Mp4Config {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    ///
    /// # Errors
    /// Returns an error if config file exists but cannot be read or parsed.
    pub(crate) fn get_user_config() -> Result<Self> {
        let Some(path) = ts2mp4::config::CONFIG_PATH.as_deref() else {
            return Ok(Self::default());
        };

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file {}:\n{e}", path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {error}",
                path.display()
            )),
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML string is invalid.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str::<UserConfig>(toml_str)
            .map(|config| config.ts2mp4)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {e}"))
    }
}

impl Config {
    /// Create config from given command line args and user config file.
    ///
    /// # Errors
    /// Returns an error if the input path does not exist.
    pub(crate) fn try_from_args(args: Ts2Mp4Args, user_config: Ts2Mp4Config) -> Result<Self> {
        let path = ts2mp4::resolve_input_path(args.path.as_deref())?;

        // Extra forbidden substrings from both sources, on top of the defaults
        let exclude: Vec<String> = user_config
            .exclude
            .into_iter()
            .chain(args.exclude)
            .map(|pattern| pattern.trim().to_string())
            .filter(|pattern| !pattern.is_empty())
            .unique()
            .collect();

        let ffmpeg = args
            .ffmpeg
            .or(user_config.ffmpeg)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG));

        let malformed_rows = if args.skip_malformed || user_config.skip_malformed_rows {
            MalformedRowPolicy::Skip
        } else {
            MalformedRowPolicy::Fail
        };

        Ok(Self {
            ffmpeg,
            filter: PathFilter::with_defaults(exclude),
            malformed_rows,
            mode: Mode::from_convert_flag(args.convert || user_config.convert),
            path,
            verbose: args.verbose || user_config.verbose,
        })
    }

    /// Parameters for the batch worker.
    pub(crate) fn run_params(&self) -> RunParams {
        RunParams {
            root: self.path.clone(),
            mode: self.mode,
            filter: self.filter.clone(),
            malformed_rows: self.malformed_rows,
        }
    }
}

#[cfg(test)]
mod ts2mp4_config_tests {
    use super::*;

    use clap::Parser;
    use tempfile::tempdir;

    #[test]
    fn from_toml_str_parses_empty_config() {
        let config = Ts2Mp4Config::from_toml_str("").expect("should parse empty config");
        assert!(!config.convert);
        assert!(!config.skip_malformed_rows);
        assert!(!config.verbose);
        assert!(config.exclude.is_empty());
        assert!(config.ffmpeg.is_none());
    }

    #[test]
    fn from_toml_str_parses_ts2mp4_section() {
        let toml = r#"
[ts2mp4]
convert = true
exclude = ["Recycle.Bin", "Temp/"]
ffmpeg = "/opt/ffmpeg/bin/ffmpeg"
skip_malformed_rows = true
verbose = true
"#;
        let config = Ts2Mp4Config::from_toml_str(toml).expect("should parse config");
        assert!(config.convert);
        assert!(config.skip_malformed_rows);
        assert!(config.verbose);
        assert_eq!(config.exclude, vec!["Recycle.Bin", "Temp/"]);
        assert_eq!(config.ffmpeg, Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")));
    }

    #[test]
    fn from_toml_str_ignores_other_sections() {
        let toml = r"
[video_convert]
bitrate = 8000
";
        let config = Ts2Mp4Config::from_toml_str(toml).expect("should parse config");
        assert!(!config.convert);
    }

    #[test]
    fn from_toml_str_invalid_toml_returns_error() {
        let result = Ts2Mp4Config::from_toml_str("this is not valid toml {{{");
        assert!(result.is_err());
    }

    #[test]
    fn args_and_user_config_are_merged() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().to_str().expect("non-utf8 temp dir").to_string();
        let args = Ts2Mp4Args::parse_from(["ts2mp4", path.as_str(), "-e", "Archive", "-e", "Temp/", "-k"]);
        let user_config =
            Ts2Mp4Config::from_toml_str("[ts2mp4]\nexclude = [\"Temp/\"]\nconvert = true\n").expect("should parse");

        let config = Config::try_from_args(args, user_config).expect("should build config");
        assert_eq!(config.mode, Mode::Convert);
        assert_eq!(config.malformed_rows, MalformedRowPolicy::Skip);
        assert_eq!(config.ffmpeg, PathBuf::from(DEFAULT_FFMPEG));
        assert!(config.filter.is_forbidden("/videos/Archive/old.ts"));
        assert!(config.filter.is_forbidden("/videos/AppData/cache.ts"));
        let temp_count = config
            .filter
            .substrings()
            .iter()
            .filter(|substring| substring.as_str() == "Temp/")
            .count();
        assert_eq!(temp_count, 1);
    }

    #[test]
    fn defaults_to_list_mode() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().to_str().expect("non-utf8 temp dir").to_string();
        let args = Ts2Mp4Args::parse_from(["ts2mp4", path.as_str()]);

        let config = Config::try_from_args(args, Ts2Mp4Config::default()).expect("should build config");
        assert_eq!(config.mode, Mode::List);
        assert_eq!(config.malformed_rows, MalformedRowPolicy::Fail);
        assert_eq!(config.run_params().root, config.path);
    }

    #[test]
    fn missing_input_path_is_an_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let missing = dir.path().join("missing");
        let path = missing.to_str().expect("non-utf8 temp dir").to_string();
        let args = Ts2Mp4Args::parse_from(["ts2mp4", path.as_str()]);
        assert!(Config::try_from_args(args, Ts2Mp4Config::default()).is_err());
    }
}
