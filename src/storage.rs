// Output directory management
//
// Reset happens once per session, inside start, strictly before the source is
// told to begin, so no frame can land in a stale or half-deleted directory.

use std::fs;
use std::path::{Path, PathBuf};

/// Idempotent delete-then-recreate of the output directory
///
/// Deletion is a no-op when the directory does not exist; creation builds
/// intermediate path components. Both steps are best-effort: a pre-existing
/// but unwritable directory should not stop the caller from attempting to
/// start capture, so failures are logged and absorbed and the per-frame
/// writes surface the underlying problem instead.
pub fn reset_output_dir(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_dir_all(path) {
            log::error!("[Storage] Failed to remove {}: {}", path.display(), e);
        }
    }

    if let Err(e) = fs::create_dir_all(path) {
        log::error!("[Storage] Failed to create {}: {}", path.display(), e);
    }
}

/// Lists snapshot files in timestamp order
///
/// Names are decimal seconds, so they are sorted by parsed value: a plain
/// name sort would put `12.346` before `2.500` once a session crosses the
/// ten-second mark. Names that do not parse fall back to name order.
pub fn list_snapshots(path: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            log::error!("[Storage] Failed to read {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let mut snapshots: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .collect();
    snapshots.sort_by(|a, b| match (snapshot_seconds(a), snapshot_seconds(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.cmp(b),
    });
    snapshots
}

/// Parses a snapshot filename back into its timestamp seconds
fn snapshot_seconds(path: &Path) -> Option<f64> {
    path.file_name()?.to_str()?.parse().ok()
}
