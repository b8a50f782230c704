use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::CheckError;
use crate::core::analysis::{DecodeOutcome, FileCache, HashOutcome};
use crate::core::dataset::{DatasetTree, FileEntry};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything a check may read during a run.
pub struct CheckContext<'a> {
    tree: &'a DatasetTree,
    cache: &'a FileCache,
    cancel: &'a CancelToken,
    parallel: bool,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        tree: &'a DatasetTree,
        cache: &'a FileCache,
        cancel: &'a CancelToken,
        parallel: bool,
    ) -> Self {
        Self {
            tree,
            cache,
            cancel,
            parallel,
        }
    }

    pub fn tree(&self) -> &'a DatasetTree {
        self.tree
    }

    pub fn cache(&self) -> &'a FileCache {
        self.cache
    }

    pub fn content_hash(&self, entry: &FileEntry) -> HashOutcome {
        self.cache.content_hash(entry)
    }

    pub fn decode(&self, entry: &FileEntry) -> DecodeOutcome {
        self.cache.decode(entry)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), CheckError> {
        if self.is_cancelled() {
            Err(CheckError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Apply `work` to every file, in parallel when enabled, keeping input order.
    ///
    /// Files not yet started when the run is cancelled are skipped and the
    /// whole call reports [`CheckError::Cancelled`].
    pub fn map_files<T, F>(&self, files: &[&'a FileEntry], work: F) -> Result<Vec<T>, CheckError>
    where
        T: Send,
        F: Fn(&'a FileEntry) -> T + Sync + Send,
    {
        let guarded = |entry: &&'a FileEntry| {
            if self.is_cancelled() {
                None
            } else {
                Some(work(*entry))
            }
        };

        let results: Option<Vec<T>> = if self.parallel {
            files.par_iter().map(guarded).collect()
        } else {
            files.iter().map(guarded).collect()
        };

        match results {
            Some(results) if !self.is_cancelled() => Ok(results),
            _ => Err(CheckError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodeConfig;
    use crate::core::dataset::ClassFolder;

    fn tiny_tree() -> DatasetTree {
        let files = (0..20)
            .map(|i| FileEntry::new(format!("/data/a/{i}.bin"), i))
            .collect();
        DatasetTree::from_classes(
            "/data",
            vec![ClassFolder {
                name: "a".to_string(),
                path: "/data/a".into(),
                files,
            }],
        )
    }

    #[test]
    fn test_map_files_keeps_order() {
        let tree = tiny_tree();
        let cache = FileCache::new(DecodeConfig::default());
        let cancel = CancelToken::new();
        let files: Vec<&FileEntry> = tree.files().collect();

        for parallel in [true, false] {
            let ctx = CheckContext::new(&tree, &cache, &cancel, parallel);
            let sizes = ctx.map_files(&files, |f| f.size_bytes).unwrap();
            assert_eq!(sizes, (0..20).collect::<Vec<u64>>());
        }
    }

    #[test]
    fn test_map_files_reports_cancellation() {
        let tree = tiny_tree();
        let cache = FileCache::new(DecodeConfig::default());
        let cancel = CancelToken::new();
        cancel.cancel();
        let files: Vec<&FileEntry> = tree.files().collect();

        let ctx = CheckContext::new(&tree, &cache, &cancel, true);
        let result = ctx.map_files(&files, |f| f.size_bytes);
        assert!(matches!(result, Err(CheckError::Cancelled)));
    }

    #[test]
    fn test_cancel_token_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
