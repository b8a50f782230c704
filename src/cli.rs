//! Command-line front end: argument parsing and the end-to-end run.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::HealthConfig;
use crate::core::checks::{ClassImbalanceCheck, CorruptFileCheck, DuplicateCheck, QualityCheck};
use crate::core::dataset::DatasetTree;
use crate::core::operations::quarantine_files;
use crate::core::pipeline::{check_by_name, Pipeline};
use crate::error::HealthError;
use crate::report::{render_text, save_report, ReportFormat};

pub const EXIT_PASS: u8 = 0;
pub const EXIT_BELOW_THRESHOLD: u8 = 1;
pub const EXIT_USAGE: u8 = 2;
pub const EXIT_FATAL: u8 = 3;

/// Every check the CLI can select, in default order.
pub const CHECK_NAMES: [&str; 4] = [
    ClassImbalanceCheck::NAME,
    DuplicateCheck::NAME,
    CorruptFileCheck::NAME,
    QualityCheck::NAME,
];

/// Diagnose a folder-per-class dataset: class imbalance, duplicates,
/// corrupt files and suspicious samples.
#[derive(Debug, Parser)]
#[command(name = "dataset-health", version, about)]
pub struct Cli {
    /// Dataset root with one subfolder per class
    pub dataset_path: PathBuf,

    /// Checks to run, e.g. "duplicate,quality" or "(duplicate, quality)". Default: all
    pub checks: Option<String>,

    /// Move flagged files into <dataset>/_quarantine/<check>/ after the run
    #[arg(long)]
    pub clean: bool,

    /// Write dataset_health_report.md into the dataset root
    #[arg(long)]
    pub md: bool,

    /// Write dataset_health_report.json into the dataset root
    #[arg(long)]
    pub json: bool,

    /// JSON configuration file; missing keys keep their defaults
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Run checks one after another instead of in parallel
    #[arg(long)]
    pub sequential: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Split a check list into known and unknown names, lowercased and in the
/// order given. Surrounding parentheses and blanks are ignored; repeats
/// are dropped.
pub fn parse_check_list(raw: &str) -> (Vec<String>, Vec<String>) {
    let mut valid: Vec<String> = Vec::new();
    let mut unknown = Vec::new();

    for name in raw
        .trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace())
        .split(',')
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
    {
        if !CHECK_NAMES.contains(&name.as_str()) {
            unknown.push(name);
        } else if !valid.contains(&name) {
            valid.push(name);
        }
    }
    (valid, unknown)
}

/// Exit code for an error that ended the run.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<HealthError>() {
        Some(e) if e.is_dataset_error() => EXIT_FATAL,
        Some(HealthError::Config(_)) => EXIT_USAGE,
        _ => EXIT_FATAL,
    }
}

/// Run the health check described by `cli` and return the exit code.
pub fn execute(cli: &Cli) -> Result<u8> {
    let mut config = match &cli.config {
        Some(path) => HealthConfig::load(path)?,
        None => HealthConfig::default(),
    };
    if cli.sequential {
        config.pipeline.parallel = false;
    }

    let selected = match &cli.checks {
        Some(raw) => {
            let (valid, unknown) = parse_check_list(raw);
            if !unknown.is_empty() {
                warn!("Ignoring unknown checks: {}", unknown.join(", "));
                eprintln!("Unknown checks ignored: {}", unknown.join(", "));
            }
            if valid.is_empty() {
                eprintln!(
                    "No valid checks specified. Available: {}",
                    CHECK_NAMES.join(", ")
                );
                return Ok(EXIT_USAGE);
            }
            Some(valid)
        }
        None => None,
    };

    let tree = DatasetTree::build_with_options(&cli.dataset_path, config.pipeline.follow_symlinks)
        .with_context(|| format!("cannot scan dataset {}", cli.dataset_path.display()))?;
    let root = tree.root_path().to_path_buf();

    let passing_score = config.scoring.passing_score;
    let mut pipeline = match selected {
        Some(names) => {
            let checks = names
                .iter()
                .filter_map(|name| check_by_name(name, &config))
                .collect();
            Pipeline::with_checks(tree, config, checks)
        }
        None => Pipeline::new(tree, config),
    };
    info!("Checks: {}", pipeline.check_names().join(", "));

    let run = pipeline.run_all().context("health check run failed")?;
    print!("{}", render_text(&run));

    for (wanted, format) in [(cli.md, ReportFormat::Markdown), (cli.json, ReportFormat::Json)] {
        if wanted {
            let path = root.join(format.default_file_name());
            save_report(&run, &path, format)
                .with_context(|| format!("cannot write report {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
    }

    if cli.clean {
        let flagged = run.flagged_files();
        let summary = quarantine_files(&root, &flagged);
        println!(
            "Quarantine: {} moved, {} skipped, {} failed",
            summary.moved.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        for (path, reason) in &summary.failed {
            eprintln!("  could not move {}: {}", path.display(), reason);
        }
    }

    Ok(if run.passed(passing_score) {
        EXIT_PASS
    } else {
        EXIT_BELOW_THRESHOLD
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_list_forms() {
        let (valid, unknown) = parse_check_list("duplicate,quality");
        assert_eq!(valid, vec!["duplicate", "quality"]);
        assert!(unknown.is_empty());

        let (valid, _) = parse_check_list("(Duplicate, corrupt_file )");
        assert_eq!(valid, vec!["duplicate", "corrupt_file"]);
    }

    #[test]
    fn test_parse_check_list_unknown_and_repeats() {
        let (valid, unknown) = parse_check_list("quality, labels, quality,,");
        assert_eq!(valid, vec!["quality"]);
        assert_eq!(unknown, vec!["labels"]);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "dataset-health",
            "/data",
            "duplicate",
            "--clean",
            "--json",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.dataset_path, PathBuf::from("/data"));
        assert_eq!(cli.checks.as_deref(), Some("duplicate"));
        assert!(cli.clean && cli.json && !cli.md);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_exit_codes_for_errors() {
        let missing = anyhow::Error::new(HealthError::NotFound("/nope".into()))
            .context("cannot scan dataset /nope");
        assert_eq!(exit_code_for(&missing), EXIT_FATAL);

        let config = anyhow::Error::new(HealthError::config("bad threshold"));
        assert_eq!(exit_code_for(&config), EXIT_USAGE);
    }
}
