//! Turns user-supplied paths into upload candidates

use std::path::Path;

use walkdir::WalkDir;

use super::{FileCandidate, UploadError};

/// Collect regular files under `path`. A file path yields itself, a
/// directory is walked recursively. Candidates are keyed by bare file
/// name since everything lands in one target folder.
pub fn scan_path(path: &Path, follow_symlinks: bool) -> Result<Vec<FileCandidate>, UploadError> {
    let io_err = |source: std::io::Error| UploadError::Io {
        name: path.display().to_string(),
        source,
    };
    let metadata = std::fs::metadata(path).map_err(io_err)?;

    if metadata.is_file() {
        return Ok(candidate(path, metadata.len()).into_iter().collect());
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(path).follow_links(follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry under {}: {}", path.display(), e);
                continue;
            }
        };
        if !follow_symlinks && entry.file_type().is_symlink() {
            tracing::warn!("skipping symlink: {}", entry.path().display());
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!("skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        candidates.extend(candidate(entry.path(), size));
    }

    tracing::debug!("Found {} file(s) under {}", candidates.len(), path.display());
    Ok(candidates)
}

fn candidate(path: &Path, size: u64) -> Option<FileCandidate> {
    let name = path.file_name()?.to_string_lossy().to_string();
    Some(FileCandidate::from_path(name, size, path.to_path_buf()))
}
