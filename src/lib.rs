//! Health checks for folder-per-class datasets.
//!
//! Build a [`DatasetTree`], hand it to a [`Pipeline`] with the checks to
//! run, and render the resulting [`PipelineRun`]:
//!
//! ```no_run
//! use dataset_health::{DatasetTree, HealthConfig, Pipeline};
//! use std::path::Path;
//!
//! let tree = DatasetTree::build(Path::new("data/train"))?;
//! let run = Pipeline::new(tree, HealthConfig::default()).run_all()?;
//! println!("{}", dataset_health::report::render_text(&run));
//! # Ok::<(), dataset_health::HealthError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod report;

pub use config::HealthConfig;
pub use self::core::{
    Check, CheckContext, CheckError, CheckResult, CheckStatus, DatasetTree, Issue, Pipeline,
    PipelineRun, Severity,
};
pub use error::{HealthError, Result};
