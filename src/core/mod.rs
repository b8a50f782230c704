pub mod analysis;
pub mod checks;
pub mod dataset;
pub mod operations;
pub mod pipeline;
pub mod score;

pub use checks::{Check, CheckContext, CheckError, CheckResult, CheckStatus, Issue, Severity};
pub use dataset::{ClassFolder, DatasetTree, FileEntry};
pub use pipeline::{builtin_checks, check_by_name, FlaggedFile, Pipeline, PipelineRun};
pub use score::{compute_score, HealthStatus, ScoreBreakdown};
