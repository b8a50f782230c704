//! Runs a list of checks against one dataset tree and assembles the results.

use chrono::{DateTime, Local};
use rayon::prelude::*;
use serde::Serialize;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

use crate::config::HealthConfig;
use crate::core::analysis::FileCache;
use crate::core::checks::{
    CancelToken, Check, CheckContext, CheckError, CheckResult, ClassImbalanceCheck,
    CorruptFileCheck, DuplicateCheck, QualityCheck, Severity,
};
use crate::core::dataset::DatasetTree;
use crate::core::score::{compute_score, HealthStatus, ScoreBreakdown};
use crate::error::{HealthError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Ready,
    Running,
    Finished,
}

/// Wall-clock time spent in one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckTiming {
    pub check_name: String,
    pub duration_secs: f64,
}

/// A file referenced by a warning or critical issue, with the check that flagged it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedFile {
    pub path: PathBuf,
    /// Name of the first check that flagged the file.
    pub reason: String,
    pub severity: Severity,
}

/// Everything one `run_all` produced. Owned by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub dataset_path: PathBuf,
    pub started_at: DateTime<Local>,
    pub duration_secs: f64,
    /// One result per check, in check order.
    pub results: Vec<CheckResult>,
    pub score: ScoreBreakdown,
    pub timings: Vec<CheckTiming>,
    /// Underlying decode attempts across the whole run.
    pub files_decoded: usize,
    /// Underlying hash computations across the whole run.
    pub files_hashed: usize,
    pub class_count: usize,
    pub total_files: usize,
    pub total_bytes: u64,
}

impl PipelineRun {
    pub fn get(&self, check_name: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.check_name == check_name)
    }

    pub fn overall_score(&self) -> u32 {
        self.score.score
    }

    pub fn health_status(&self) -> HealthStatus {
        self.score.status()
    }

    pub fn passed(&self, passing_score: u32) -> bool {
        self.overall_score() >= passing_score
    }

    pub fn issue_count(&self, severity: Severity) -> usize {
        self.results.iter().map(|r| r.count(severity)).sum()
    }

    /// Flat, deduplicated list of files referenced by warning or critical
    /// issues, in check order. The duplicate check never raises an issue on
    /// a kept representative, so one only shows up here when another check
    /// flagged it.
    pub fn flagged_files(&self) -> Vec<FlaggedFile> {
        let mut seen: HashSet<&Path> = HashSet::new();
        let mut flagged = Vec::new();
        for result in &self.results {
            for issue in &result.issues {
                if issue.severity < Severity::Warning {
                    continue;
                }
                let Some(path) = issue.file_path.as_deref() else {
                    continue;
                };
                if !seen.insert(path) {
                    continue;
                }
                flagged.push(FlaggedFile {
                    path: path.to_path_buf(),
                    reason: result.check_name.clone(),
                    severity: issue.severity,
                });
            }
        }
        flagged
    }
}

/// The four built-in checks, in their default order.
pub fn builtin_checks(config: &HealthConfig) -> Vec<Box<dyn Check>> {
    vec![
        Box::new(ClassImbalanceCheck::new(config.imbalance.clone())),
        Box::new(DuplicateCheck::new(config.duplicate.clone())),
        Box::new(CorruptFileCheck::new()),
        Box::new(QualityCheck::new(config.quality.clone())),
    ]
}

/// Look up a built-in check by its name.
pub fn check_by_name(name: &str, config: &HealthConfig) -> Option<Box<dyn Check>> {
    let check: Box<dyn Check> = match name {
        ClassImbalanceCheck::NAME => Box::new(ClassImbalanceCheck::new(config.imbalance.clone())),
        DuplicateCheck::NAME => Box::new(DuplicateCheck::new(config.duplicate.clone())),
        CorruptFileCheck::NAME => Box::new(CorruptFileCheck::new()),
        QualityCheck::NAME => Box::new(QualityCheck::new(config.quality.clone())),
        _ => return None,
    };
    Some(check)
}

pub struct Pipeline {
    tree: DatasetTree,
    config: HealthConfig,
    checks: Vec<Box<dyn Check>>,
    state: PipelineState,
    cancel: CancelToken,
}

impl Pipeline {
    /// A pipeline running every built-in check.
    pub fn new(tree: DatasetTree, config: HealthConfig) -> Self {
        let checks = builtin_checks(&config);
        Self::with_checks(tree, config, checks)
    }

    /// A pipeline running exactly `checks`, in order. Later checks with an
    /// already registered name are dropped.
    pub fn with_checks(
        tree: DatasetTree,
        config: HealthConfig,
        checks: Vec<Box<dyn Check>>,
    ) -> Self {
        let mut pipeline = Self {
            tree,
            config,
            checks: Vec::with_capacity(checks.len()),
            state: PipelineState::Ready,
            cancel: CancelToken::new(),
        };
        for check in checks {
            pipeline.register(check);
        }
        pipeline
    }

    fn register(&mut self, check: Box<dyn Check>) {
        if self.checks.iter().any(|c| c.name() == check.name()) {
            warn!("Check '{}' is already registered, skipping", check.name());
            return;
        }
        debug!("Registered check '{}'", check.name());
        self.checks.push(check);
    }

    /// Append a check. Fails once the first run has started.
    pub fn add_check(&mut self, check: Box<dyn Check>) -> Result<()> {
        if self.state != PipelineState::Ready {
            return Err(HealthError::pipeline_state(format!(
                "cannot add check '{}' after the pipeline has run",
                check.name()
            )));
        }
        self.register(check);
        Ok(())
    }

    /// Token that cancels an in-progress `run_all` from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn tree(&self) -> &DatasetTree {
        &self.tree
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run every check once against the tree. Each call starts from an
    /// empty file cache, so hashes and decodes are memoized per run only.
    ///
    /// Either every check finishes and a complete [`PipelineRun`] is
    /// returned, or the run was cancelled and nothing is.
    pub fn run_all(&mut self) -> Result<PipelineRun> {
        if self.state == PipelineState::Running {
            return Err(HealthError::pipeline_state("pipeline is already running"));
        }
        self.state = PipelineState::Running;

        let started_at = Local::now();
        let start = Instant::now();
        info!(
            "Running {} checks on {:?} ({} classes, {} files)",
            self.checks.len(),
            self.tree.root_path(),
            self.tree.classes().len(),
            self.tree.total_files()
        );

        let parallel = self.config.pipeline.parallel;
        let cache = FileCache::new(self.config.decode.clone());
        let ctx = CheckContext::new(&self.tree, &cache, &self.cancel, parallel);

        let outcomes: Vec<Option<(CheckResult, CheckTiming)>> = if parallel {
            self.checks
                .par_iter()
                .map(|check| run_guarded(check.as_ref(), &ctx))
                .collect()
        } else {
            self.checks
                .iter()
                .map(|check| run_guarded(check.as_ref(), &ctx))
                .collect()
        };

        self.state = PipelineState::Finished;

        let completed: Option<Vec<_>> = outcomes.into_iter().collect();
        let Some(completed) = completed.filter(|_| !self.cancel.is_cancelled()) else {
            warn!("Run cancelled, discarding partial results");
            return Err(HealthError::Cancelled);
        };
        let (results, timings): (Vec<_>, Vec<_>) = completed.into_iter().unzip();

        let score = compute_score(&results, &self.config.scoring);
        let duration_secs = start.elapsed().as_secs_f64();
        info!(
            "Run finished in {:.2}s: score {}/100, {} decodes, {} hashes",
            duration_secs,
            score.score,
            cache.decode_count(),
            cache.hash_count()
        );

        Ok(PipelineRun {
            dataset_path: self.tree.root_path().to_path_buf(),
            started_at,
            duration_secs,
            results,
            score,
            timings,
            files_decoded: cache.decode_count(),
            files_hashed: cache.hash_count(),
            class_count: self.tree.classes().len(),
            total_files: self.tree.total_files(),
            total_bytes: self.tree.total_bytes(),
        })
    }
}

/// Run one check, turning errors and panics into a crashed result.
/// `None` means the check observed cancellation.
fn run_guarded(check: &dyn Check, ctx: &CheckContext<'_>) -> Option<(CheckResult, CheckTiming)> {
    let name = check.name().to_string();
    let _span = info_span!("check", name = %name).entered();
    let start = Instant::now();
    debug!("Starting check '{}'", name);

    let mut result = match panic::catch_unwind(AssertUnwindSafe(|| check.run(ctx))) {
        Ok(Ok(result)) => result,
        Ok(Err(CheckError::Cancelled)) => {
            info!("Check '{}' cancelled", name);
            return None;
        }
        Ok(Err(CheckError::Failed(reason))) => {
            error!("Check '{}' failed: {}", name, reason);
            CheckResult::crashed(&name, &reason)
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!("Check '{}' panicked: {}", name, reason);
            CheckResult::crashed(&name, &reason)
        }
    };
    result.check_name.clone_from(&name);

    let duration_secs = start.elapsed().as_secs_f64();
    info!(
        "Check '{}' {} in {:.3}s ({} issues)",
        name,
        result.status.as_str(),
        duration_secs,
        result.issues.len()
    );
    Some((
        result,
        CheckTiming {
            check_name: name,
            duration_secs,
        },
    ))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
