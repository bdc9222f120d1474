//! Atomic persistence of pruned stylesheets.
//!
//! Output is written to a `tempfile::NamedTempFile` in the destination
//! directory and renamed over the target. The temporary file is deleted when
//! dropped, so every failure path (including a failed rename) leaves the
//! destination exactly as it was.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{CsstrimResult, IoResultExt};

/// Where the pruned version of `input` goes: `output_dir/<file name>`, or the
/// input itself when no output directory is configured.
pub fn destination(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    match (output_dir, input.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => input.to_path_buf(),
    }
}

/// Replace `path` with `bytes` atomically.
///
/// The existing file's permissions are carried over to the new file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write a pruned stylesheet, creating the destination directory if needed.
pub fn write_stylesheet(dest: &Path, text: &str) -> CsstrimResult<()> {
    if let Some(dir) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_write_path(dir)?;
    }
    write_atomic(dest, text.as_bytes()).with_write_path(dest)
}
