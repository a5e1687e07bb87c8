use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Deletes `.tmp` files left behind by transfers that died without
/// cleaning up. Runs at boot, before the engine restores state, while no
/// transfer is active. Returns the number of files removed.
pub fn sweep_orphaned_temp_files(root: &Path) -> usize {
    if !root.exists() {
        return 0;
    }

    let mut removed = 0;
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_tmp = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tmp"));
        if !is_tmp {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                removed += 1;
                info!(path = %entry.path().display(), "Removed orphaned temp file");
            }
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove temp file");
            }
        }
    }

    removed
}
