//! Move converted originals into the backup area.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, Ts2Mp4Error};

/// Path under `backup_root` mirroring the location of `source` relative to `input_root`.
///
/// A source outside the input root is placed directly under the backup root.
#[must_use]
pub fn backup_path(source: &Path, input_root: &Path, backup_root: &Path) -> PathBuf {
    source.strip_prefix(input_root).map_or_else(
        |_| backup_root.join(source.file_name().unwrap_or(source.as_os_str())),
        |relative| backup_root.join(relative),
    )
}

/// Move `source` to its mirrored path under `backup_root`, creating parent directories.
///
/// Returns the new location of the file.
pub fn archive(source: &Path, input_root: &Path, backup_root: &Path) -> Result<PathBuf> {
    let target = backup_path(source, input_root, backup_root);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Ts2Mp4Error::io(parent, e))?;
    }

    match fs::rename(source, &target) {
        Ok(()) => Ok(target),
        Err(error) if error.kind() == ErrorKind::CrossesDevices => {
            fs::copy(source, &target).map_err(|e| Ts2Mp4Error::io(&target, e))?;
            fs::remove_file(source).map_err(|e| Ts2Mp4Error::io(source, e))?;
            Ok(target)
        }
        Err(error) => Err(Ts2Mp4Error::io(source, error)),
    }
}
