use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::{FastError, Result};
use crate::naming::{INPUT_EXT, OUTPUT_EXT, PLOT_EXT, STATS_EXT};

/// Extensions removed by `fast clean`. Stats and plots only with `with_stats`.
pub fn extensions(with_stats: bool) -> Vec<&'static str> {
    let mut exts = vec![INPUT_EXT, OUTPUT_EXT];
    if with_stats {
        exts.push(STATS_EXT);
        exts.push(PLOT_EXT);
    }
    exts
}

/// Generated files directly inside `dir`, sorted by name. Symlinks and directories are skipped.
pub fn generated_files(dir: &Path, with_stats: bool) -> Result<Vec<PathBuf>> {
    let exts = extensions(with_stats);
    let entries = std::fs::read_dir(dir).map_err(|e| FastError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let path = entry.path();

        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| exts.contains(&e));
        if !matches {
            continue;
        }

        let metadata = match path.symlink_metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        if metadata.file_type().is_symlink() || !metadata.is_file() {
            continue;
        }

        files.push(path);
    }

    files.sort();
    Ok(files)
}

/// Removes generated files from `dir`, returning what was removed.
pub fn clean(dir: &Path, with_stats: bool) -> Result<Vec<PathBuf>> {
    let files = generated_files(dir, with_stats)?;
    for file in &files {
        std::fs::remove_file(file).map_err(|e| FastError::io(file, e))?;
        info!("Removed: {}", file.display());
    }
    Ok(files)
}
