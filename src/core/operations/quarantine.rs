use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::file_ops::move_file;
use crate::core::dataset::QUARANTINE_DIR;
use crate::core::pipeline::FlaggedFile;

/// Outcome of one quarantine pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuarantineSummary {
    /// `(from, to)` for every moved file.
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Files outside the dataset root or already gone.
    pub skipped: Vec<PathBuf>,
    /// Files whose move failed, with the error message.
    pub failed: Vec<(PathBuf, String)>,
}

/// Where a flagged file lands: `<root>/_quarantine/<reason>/<path relative to root>`.
pub fn quarantine_destination(root: &Path, file: &FlaggedFile) -> Option<PathBuf> {
    let relative = file.path.strip_prefix(root).ok()?;
    Some(root.join(QUARANTINE_DIR).join(&file.reason).join(relative))
}

/// Move every flagged file into the quarantine folder, preserving its
/// class-relative layout. Per-file failures are recorded, never fatal.
pub fn quarantine_files(root: &Path, files: &[FlaggedFile]) -> QuarantineSummary {
    let mut summary = QuarantineSummary::default();

    for file in files {
        let Some(dest) = quarantine_destination(root, file) else {
            warn!("{:?} is outside {:?}, not quarantining", file.path, root);
            summary.skipped.push(file.path.clone());
            continue;
        };
        if !file.path.is_file() {
            warn!("{:?} no longer exists, not quarantining", file.path);
            summary.skipped.push(file.path.clone());
            continue;
        }

        match move_file(&file.path, &dest) {
            Ok(()) => summary.moved.push((file.path.clone(), dest)),
            Err(e) => summary.failed.push((file.path.clone(), e.to_string())),
        }
    }

    info!(
        "Quarantine: {} moved, {} skipped, {} failed",
        summary.moved.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checks::Severity;
    use std::fs;
    use tempfile::TempDir;

    fn flagged(path: PathBuf, reason: &str) -> FlaggedFile {
        FlaggedFile {
            path,
            reason: reason.to_string(),
            severity: Severity::Warning,
        }
    }

    #[test]
    fn test_moves_into_reason_folder() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("cats")).unwrap();
        fs::write(root.join("cats/b.jpg"), b"dup").unwrap();

        let summary = quarantine_files(root, &[flagged(root.join("cats/b.jpg"), "duplicate")]);

        let expected = root.join("_quarantine/duplicate/cats/b.jpg");
        assert_eq!(summary.moved, vec![(root.join("cats/b.jpg"), expected.clone())]);
        assert!(expected.exists());
        assert!(!root.join("cats/b.jpg").exists());
    }

    #[test]
    fn test_outside_and_missing_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("data");
        fs::create_dir_all(&root).unwrap();

        let summary = quarantine_files(
            &root,
            &[
                flagged(dir.path().join("elsewhere.png"), "quality"),
                flagged(root.join("cats/gone.png"), "quality"),
            ],
        );
        assert_eq!(summary.skipped.len(), 2);
        assert!(summary.moved.is_empty());
        assert!(summary.failed.is_empty());
    }
}
