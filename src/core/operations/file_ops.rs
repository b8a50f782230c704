use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error};

/// Result type for file operations
pub type FileOpResult<T> = Result<T, FileOpError>;

#[derive(Debug, Error)]
pub enum FileOpError {
    #[error("Copy failed: {0}")]
    CopyFailed(String),
    #[error("Remove failed: {0}")]
    RemoveFailed(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Move a file from source to destination using copy + remove pattern
/// for cross-drive compatibility. Missing parent directories of `dest`
/// are created.
///
/// # Returns
/// * `Ok(())` if successful
/// * `Err(FileOpError)` if copy or remove failed; the source is left in place
pub fn move_file(src: &Path, dest: &Path) -> FileOpResult<()> {
    debug!("Moving file from {:?} to {:?}", src, dest);

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    if let Err(e) = fs::copy(src, dest) {
        error!("Failed to copy file from {:?} to {:?}: {}", src, dest, e);
        return Err(FileOpError::CopyFailed(format!(
            "Failed to copy from {:?} to {:?}: {}",
            src, dest, e
        )));
    }

    if let Err(e) = fs::remove_file(src) {
        error!("Failed to remove original file {:?} after copy: {}", src, e);
        // Leave exactly one copy behind
        let _ = fs::remove_file(dest);
        return Err(FileOpError::RemoveFailed(format!(
            "Failed to remove original file {:?}: {}",
            src, e
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_move_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"hello").unwrap();
        let dest = dir.path().join("deep/er/a.txt");

        move_file(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"hello");
    }

    #[test]
    fn test_missing_source_is_copy_failure() {
        let dir = TempDir::new().unwrap();
        let err = move_file(&dir.path().join("ghost"), &dir.path().join("out/ghost")).unwrap_err();
        assert!(matches!(err, FileOpError::CopyFailed(_)));
    }
}
