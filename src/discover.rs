//! Recursive discovery of Transport Stream files.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::conversion_log::LOG_DIR_NAME;
use crate::error::{Result, Ts2Mp4Error};
use crate::filter::PathFilter;

/// File name suffix of source files.
pub const SOURCE_EXTENSION: &str = ".ts";

/// Files found under the input root.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Candidate files in walk order.
    pub candidates: Vec<PathBuf>,
    /// Entries that could not be read during the walk.
    pub unreadable: Vec<String>,
}

/// Find all `.ts` files under `root` that do not match the forbidden filter.
///
/// The walk is sorted by file name so the order is stable between runs.
/// The backup directory directly under the root is never entered,
/// since it holds originals that were already converted.
pub fn find_candidates(root: &Path, filter: &PathFilter) -> Result<Discovery> {
    let metadata = std::fs::metadata(root).map_err(|e| Ts2Mp4Error::io(root, e))?;
    if !metadata.is_dir() {
        return Err(Ts2Mp4Error::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotADirectory, "input root is not a directory"),
        ));
    }
    std::fs::read_dir(root).map_err(|e| Ts2Mp4Error::io(root, e))?;

    let backup_dir = root.join(LOG_DIR_NAME);
    let mut discovery = Discovery::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.path() != backup_dir);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                discovery.unreadable.push(error.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_source_file(entry.path()) {
            continue;
        }
        let path_string = crate::path_to_string(entry.path());
        if filter.is_forbidden(&path_string) {
            continue;
        }
        discovery.candidates.push(entry.into_path());
    }

    Ok(discovery)
}

/// Returns true if the file name ends with the source extension.
#[must_use]
pub fn is_source_file(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| crate::os_str_to_string(name).ends_with(SOURCE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create dir");
        }
        fs::write(path, b"ts").expect("Failed to write file");
    }

    #[test]
    fn finds_nested_ts_files_in_sorted_order() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        touch(&root.join("b.ts"));
        touch(&root.join("a.ts"));
        touch(&root.join("season1/episode2.ts"));
        touch(&root.join("season1/episode1.ts"));
        touch(&root.join("notes.txt"));
        touch(&root.join("movie.mp4"));

        let discovery = find_candidates(root, &PathFilter::default()).expect("Discovery failed");
        let names: Vec<String> = discovery
            .candidates
            .iter()
            .map(|path| crate::get_relative_path_or_filename(path, root))
            .collect();

        assert_eq!(
            names,
            vec![
                "a.ts".to_string(),
                "b.ts".to_string(),
                Path::new("season1").join("episode1.ts").display().to_string(),
                Path::new("season1").join("episode2.ts").display().to_string(),
            ]
        );
    }

    #[test]
    fn skips_forbidden_directories() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        touch(&root.join("AppData/cache.ts"));
        touch(&root.join("VS-Code/test.ts"));
        touch(&root.join("keep.ts"));

        let discovery = find_candidates(root, &PathFilter::default()).expect("Discovery failed");
        assert_eq!(discovery.candidates, vec![root.join("keep.ts")]);
    }

    #[test]
    fn does_not_enter_backup_directory() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        touch(&root.join(LOG_DIR_NAME).join("old.ts"));
        touch(&root.join("new.ts"));

        let discovery = find_candidates(root, &PathFilter::default()).expect("Discovery failed");
        assert_eq!(discovery.candidates, vec![root.join("new.ts")]);
    }

    #[test]
    fn extension_match_is_literal() {
        assert!(is_source_file(Path::new("/videos/clip.ts")));
        assert!(!is_source_file(Path::new("/videos/clip.TS")));
        assert!(!is_source_file(Path::new("/videos/clip.tsx")));
        assert!(!is_source_file(Path::new("/videos/clip_ts")));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let result = find_candidates(&dir.path().join("missing"), &PathFilter::default());
        assert!(matches!(result, Err(Ts2Mp4Error::Io { .. })));
    }

    #[test]
    fn file_root_is_an_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let file = dir.path().join("single.ts");
        touch(&file);
        assert!(find_candidates(&file, &PathFilter::default()).is_err());
    }
}
