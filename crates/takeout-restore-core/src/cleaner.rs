use std::fs;
use std::path::PathBuf;

/// Result of the sidecar cleanup stage.
#[derive(Debug, Default)]
pub struct CleanResult {
    pub deleted: u64,
    pub warnings: Vec<String>,
}

/// Delete consumed sidecar files. Dry-run counts what would go without
/// touching anything; individual failures become warnings.
pub fn delete_sidecars(paths: &[PathBuf], dry_run: bool) -> CleanResult {
    let mut result = CleanResult::default();

    for path in paths {
        if !path.exists() {
            continue;
        }
        if dry_run {
            result.deleted += 1;
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => result.deleted += 1,
            Err(e) => result
                .warnings
                .push(format!("could not delete {}: {e}", path.display())),
        }
    }

    result
}
