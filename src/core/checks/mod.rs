//! The check abstraction and the built-in checks.
//!
//! A check reads the dataset tree through a [`CheckContext`] and returns one
//! [`CheckResult`]. Built-in and user-supplied checks implement the same
//! [`Check`] trait; the pipeline treats them identically.

mod class_imbalance;
mod context;
mod corrupt_file;
mod duplicate;
mod quality;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub use class_imbalance::{ClassHealth, ClassImbalanceCheck, ClassShare};
pub use context::{CancelToken, CheckContext};
pub use corrupt_file::{CorruptFile, CorruptFileCheck};
pub use duplicate::{DuplicateCheck, DuplicateGroup};
pub use quality::{
    classify_image, classify_text, FlaggedSample, QualityCategory, QualityCheck, SampleStats,
};

/// Issue severity, ordered from least to most serious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Warning,
    Failed,
}

impl CheckStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Warning => "warning",
            CheckStatus::Failed => "failed",
        }
    }

    /// Default status policy: any critical issue fails, any warning warns.
    pub fn from_issues(issues: &[Issue]) -> Self {
        match issues.iter().map(|issue| issue.severity).max() {
            Some(Severity::Critical) => CheckStatus::Failed,
            Some(Severity::Warning) => CheckStatus::Warning,
            _ => CheckStatus::Passed,
        }
    }
}

/// A single finding. Pure data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub file_path: Option<PathBuf>,
    pub message: String,
    pub metric_value: Option<f64>,
}

impl Issue {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            file_path: None,
            message: message.into(),
            metric_value: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, message)
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_metric(mut self, value: f64) -> Self {
        self.metric_value = Some(value);
        self
    }
}

/// Structured detail a renderer needs beyond issues and metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Findings {
    #[default]
    None,
    ClassDistribution {
        classes: Vec<ClassShare>,
        imbalance_ratio: f64,
    },
    Duplicates {
        groups: Vec<DuplicateGroup>,
        wasted_bytes: u64,
    },
    CorruptFiles {
        files: Vec<CorruptFile>,
    },
    Quality {
        flagged: Vec<FlaggedSample>,
    },
}

/// Output of one check for one run. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_name: String,
    pub status: CheckStatus,
    pub issues: Vec<Issue>,
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub findings: Findings,
}

impl CheckResult {
    /// A result whose status follows [`CheckStatus::from_issues`].
    pub fn from_issues(check_name: impl Into<String>, issues: Vec<Issue>) -> Self {
        Self {
            check_name: check_name.into(),
            status: CheckStatus::from_issues(&issues),
            issues,
            metrics: BTreeMap::new(),
            findings: Findings::None,
        }
    }

    /// The single-issue result recorded when a check errors out or panics.
    pub fn crashed(check_name: impl Into<String>, reason: &str) -> Self {
        let check_name = check_name.into();
        let issue = Issue::critical(format!("check '{check_name}' crashed: {reason}"));
        Self::from_issues(check_name, vec![issue])
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_findings(mut self, findings: Findings) -> Self {
        self.findings = findings;
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }
}

/// Errors a check may return instead of a result.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The run was cancelled while the check was working.
    #[error("check cancelled")]
    Cancelled,

    /// Unexpected failure. The pipeline records it as a "check crashed" issue.
    #[error("{0}")]
    Failed(String),
}

/// A dataset health check.
///
/// Implementations must not mutate the tree and must not fail on a single
/// bad file: per-file problems become issues.
pub trait Check: Send + Sync {
    /// Stable name, used as the key in a pipeline run and as the quarantine reason.
    fn name(&self) -> &str;

    fn run(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_issues() {
        assert_eq!(CheckStatus::from_issues(&[]), CheckStatus::Passed);
        assert_eq!(
            CheckStatus::from_issues(&[Issue::info("fyi")]),
            CheckStatus::Passed
        );
        assert_eq!(
            CheckStatus::from_issues(&[Issue::info("fyi"), Issue::warning("hmm")]),
            CheckStatus::Warning
        );
        assert_eq!(
            CheckStatus::from_issues(&[Issue::warning("hmm"), Issue::critical("bad")]),
            CheckStatus::Failed
        );
    }

    #[test]
    fn test_crashed_result() {
        let result = CheckResult::crashed("custom", "boom");
        assert_eq!(result.check_name, "custom");
        assert_eq!(result.status, CheckStatus::Failed);
        assert_eq!(result.count(Severity::Critical), 1);
        assert!(result.issues[0].message.contains("boom"));
    }

    #[test]
    fn test_issue_builder() {
        let issue = Issue::warning("dark")
            .with_path("/data/cats/a.png")
            .with_metric(3.5);
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.file_path, Some(PathBuf::from("/data/cats/a.png")));
        assert_eq!(issue.metric_value, Some(3.5));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
