use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{Check, CheckContext, CheckError, CheckResult, Findings, Issue};
use crate::config::DuplicateConfig;
use crate::core::dataset::FileEntry;

/// Files sharing one content hash. `kept` is the first in traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub hash: String,
    pub kept: PathBuf,
    pub duplicates: Vec<PathBuf>,
    /// Size of one member.
    pub size_bytes: u64,
}

impl DuplicateGroup {
    /// Kept file plus its duplicates.
    pub fn member_count(&self) -> usize {
        self.duplicates.len() + 1
    }

    pub fn wasted_bytes(&self) -> u64 {
        self.size_bytes * self.duplicates.len() as u64
    }
}

/// Groups files by SHA-256 of their bytes.
pub struct DuplicateCheck {
    config: DuplicateConfig,
}

impl DuplicateCheck {
    pub const NAME: &'static str = "duplicate";

    pub fn new(config: DuplicateConfig) -> Self {
        Self { config }
    }

    /// Group files (already in traversal order) by hash, preserving the
    /// order in which each hash was first seen.
    fn group<'a>(
        files: &[&'a FileEntry],
        hashes: &[Option<Result<String, String>>],
    ) -> (Vec<(String, Vec<&'a FileEntry>)>, Vec<Issue>) {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<(String, Vec<&'a FileEntry>)> = Vec::new();
        let mut issues = Vec::new();

        for (file, hash) in files.iter().zip(hashes) {
            match hash {
                None => {}
                Some(Ok(hash)) => match index.get(hash.as_str()) {
                    Some(&slot) => groups[slot].1.push(*file),
                    None => {
                        index.insert(hash.as_str(), groups.len());
                        groups.push((hash.clone(), vec![*file]));
                    }
                },
                Some(Err(reason)) => {
                    warn!("Could not hash {:?}: {}", file.path, reason);
                    issues.push(
                        Issue::info(format!("could not hash file: {reason}"))
                            .with_path(&file.path),
                    );
                }
            }
        }

        (groups, issues)
    }
}

impl Default for DuplicateCheck {
    fn default() -> Self {
        Self::new(DuplicateConfig::default())
    }
}

impl Check for DuplicateCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
        let files: Vec<&FileEntry> = ctx.tree().files().collect();
        let skip_empty = self.config.skip_empty_files;

        let hashes = ctx.map_files(&files, |file| {
            if skip_empty && file.size_bytes == 0 {
                None
            } else {
                Some(ctx.content_hash(file))
            }
        })?;

        let (groups, mut issues) = Self::group(&files, &hashes);

        let mut duplicate_groups = Vec::new();
        for (hash, members) in groups.into_iter().filter(|(_, members)| members.len() > 1) {
            let kept = members[0];
            for duplicate in &members[1..] {
                issues.push(
                    Issue::warning(format!("duplicate of {}", kept.path.display()))
                        .with_path(&duplicate.path)
                        .with_metric(duplicate.size_bytes as f64),
                );
            }
            duplicate_groups.push(DuplicateGroup {
                hash,
                kept: kept.path.clone(),
                duplicates: members[1..].iter().map(|f| f.path.clone()).collect(),
                size_bytes: kept.size_bytes,
            });
        }

        let wasted_bytes: u64 = duplicate_groups.iter().map(DuplicateGroup::wasted_bytes).sum();
        let duplicate_files: usize = duplicate_groups.iter().map(|g| g.duplicates.len()).sum();

        info!(
            "Duplicate scan: {} files, {} groups, {} redundant files, {} bytes wasted",
            files.len(),
            duplicate_groups.len(),
            duplicate_files,
            wasted_bytes
        );

        Ok(CheckResult::from_issues(Self::NAME, issues)
            .with_metric("files_scanned", files.len() as f64)
            .with_metric("duplicate_groups", duplicate_groups.len() as f64)
            .with_metric("duplicate_files", duplicate_files as f64)
            .with_metric("wasted_bytes", wasted_bytes as f64)
            .with_findings(Findings::Duplicates {
                groups: duplicate_groups,
                wasted_bytes,
            }))
    }
}
