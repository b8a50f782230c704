use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use super::{Check, CheckContext, CheckError, CheckResult, Findings, Issue};
use crate::core::analysis::DecodeFailure;
use crate::core::dataset::FileEntry;

/// A file that failed to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorruptFile {
    pub path: PathBuf,
    pub reason: DecodeFailure,
}

/// Decodes every file under its expected content type.
///
/// Images must decode to at least one pixel, text files must be readable
/// and non-empty, anything else must open and yield bytes. Decode results
/// go through the shared file cache, so a later quality pass reuses them.
#[derive(Debug, Default)]
pub struct CorruptFileCheck;

impl CorruptFileCheck {
    pub const NAME: &'static str = "corrupt_file";

    pub fn new() -> Self {
        Self
    }
}

impl Check for CorruptFileCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
        let files: Vec<&FileEntry> = ctx.tree().files().collect();
        let outcomes = ctx.map_files(&files, |file| ctx.decode(file).err())?;

        let corrupt: Vec<CorruptFile> = files
            .iter()
            .zip(outcomes)
            .filter_map(|(file, failure)| {
                failure.map(|reason| CorruptFile {
                    path: file.path.clone(),
                    reason,
                })
            })
            .collect();

        let issues: Vec<Issue> = corrupt
            .iter()
            .map(|c| Issue::critical(c.reason.to_string()).with_path(&c.path))
            .collect();
        let timed_out = corrupt
            .iter()
            .filter(|c| matches!(c.reason, DecodeFailure::TimedOut(_)))
            .count();

        info!(
            "Corrupt file scan: {} of {} files failed to decode",
            corrupt.len(),
            files.len()
        );

        Ok(CheckResult::from_issues(Self::NAME, issues)
            .with_metric("files_checked", files.len() as f64)
            .with_metric("corrupt_files", corrupt.len() as f64)
            .with_metric("timed_out", timed_out as f64)
            .with_findings(Findings::CorruptFiles { files: corrupt }))
    }
}
