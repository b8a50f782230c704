//! Plain-text, markdown and JSON renderings of a [`PipelineRun`].
//!
//! Everything is read from the run itself; nothing touches the filesystem
//! except [`save_report`].

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use super::recommendations::{format_bytes, recommendations};
use crate::core::checks::{CheckResult, Findings, QualityCategory, SampleStats, Severity};
use crate::core::pipeline::PipelineRun;
use crate::error::{HealthError, Result};

/// Groups and files listed per section before the rest is elided.
const MAX_EXAMPLES: usize = 5;
const WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn default_file_name(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "dataset_health_report.md",
            ReportFormat::Json => "dataset_health_report.json",
        }
    }
}

#[derive(Default)]
struct Lines(Vec<String>);

impl Lines {
    fn line(&mut self, text: impl Into<String>) {
        self.0.push(text.into());
    }

    fn blank(&mut self) {
        self.0.push(String::new());
    }

    fn divider(&mut self) {
        self.0.push("-".repeat(WIDTH));
    }

    fn heading(&mut self, title: &str) {
        self.divider();
        self.line(title);
        self.divider();
    }

    fn finish(self) -> String {
        let mut out = self.0.join("\n");
        out.push('\n');
        out
    }
}

fn sample_detail(stats: &SampleStats) -> String {
    match stats {
        SampleStats::Pixels { mean, std } => format!("mean={:.1}, std={:.1}", mean, std),
        SampleStats::Text { printable_ratio } => {
            format!("{:.0}% printable", printable_ratio * 100.0)
        }
    }
}

/// Issues of checks that carry no structured findings (custom or crashed checks).
fn other_results(run: &PipelineRun) -> impl Iterator<Item = &CheckResult> {
    run.results
        .iter()
        .filter(|r| matches!(r.findings, Findings::None) && !r.issues.is_empty())
}

pub fn render_text(run: &PipelineRun) -> String {
    let mut out = Lines::default();

    out.line("=".repeat(WIDTH));
    out.line("DATASET HEALTH CHECK REPORT");
    out.line("=".repeat(WIDTH));
    out.blank();
    out.line("Dataset Path:");
    out.line(format!("  {}", run.dataset_path.display()));
    out.blank();

    out.line("Scan Summary:");
    out.line(format!("  {:<25} : {}", "Started", run.started_at.format("%Y-%m-%d %H:%M:%S")));
    out.line(format!("  {:<25} : {:.2}s", "Scan Duration", run.duration_secs));
    out.line(format!("  {:<25} : {}", "Classes", run.class_count));
    out.line(format!("  {:<25} : {}", "Files", run.total_files));
    out.line(format!("  {:<25} : {}", "Total Size", format_bytes(run.total_bytes)));
    out.line(format!("  {:<25} : {}", "Files Decoded", run.files_decoded));
    out.line(format!("  {:<25} : {}", "Files Hashed", run.files_hashed));
    out.blank();

    for result in &run.results {
        match &result.findings {
            Findings::ClassDistribution {
                classes,
                imbalance_ratio,
            } => {
                out.heading("CLASS DISTRIBUTION");
                out.line(format!(
                    "{:<24} {:>8} {:>12}  {}",
                    "Class Name", "Files", "Percentage", "Status"
                ));
                out.divider();
                for class in classes {
                    out.line(format!(
                        "{:<24} {:>8} {:>11.1}%  {}",
                        class.name,
                        class.count,
                        class.percentage,
                        class.health.as_str()
                    ));
                }
                out.blank();
                out.line(format!("Imbalance Ratio (Max / Min): {:.2}", imbalance_ratio));
                out.blank();
            }
            Findings::Duplicates {
                groups,
                wasted_bytes,
            } => {
                let files: usize = groups.iter().map(|g| g.duplicates.len()).sum();
                out.heading("DUPLICATE FILES");
                out.line(format!("Duplicate Groups Found: {}", groups.len()));
                out.line(format!("Total Duplicate Files : {}", files));
                out.line(format!("Wasted Space          : {}", format_bytes(*wasted_bytes)));
                for (idx, group) in groups.iter().take(MAX_EXAMPLES).enumerate() {
                    out.blank();
                    out.line(format!("  Group {}:", idx + 1));
                    out.line(format!("    Hash: {}", group.hash));
                    out.line(format!("    Kept: {}", group.kept.display()));
                    for duplicate in &group.duplicates {
                        out.line(format!("      - {}", duplicate.display()));
                    }
                }
                if groups.len() > MAX_EXAMPLES {
                    out.line(format!("  ... and {} more groups", groups.len() - MAX_EXAMPLES));
                }
                out.blank();
            }
            Findings::CorruptFiles { files } => {
                out.heading("CORRUPT FILES");
                out.line(format!("Corrupt Files Found: {}", files.len()));
                for file in files {
                    out.line(format!("  - {} ({})", file.path.display(), file.reason));
                }
                out.blank();
            }
            Findings::Quality { flagged } => {
                out.heading("SUSPICIOUS SAMPLES");
                for category in QualityCategory::ALL {
                    let count = flagged.iter().filter(|s| s.category == category).count();
                    out.line(format!("{:<25} : {}", category.label(), count));
                }
                if !flagged.is_empty() {
                    out.blank();
                    out.line("Flagged Files:");
                    for sample in flagged {
                        out.line(format!(
                            "  - {} ({}: {})",
                            sample.path.display(),
                            sample.category.label(),
                            sample_detail(&sample.stats)
                        ));
                    }
                }
                out.blank();
            }
            Findings::None => {}
        }
    }

    for result in other_results(run) {
        out.heading(&format!("CHECK: {}", result.check_name.to_uppercase()));
        for issue in &result.issues {
            match &issue.file_path {
                Some(path) => out.line(format!(
                    "  [{}] {}: {}",
                    issue.severity.as_str(),
                    path.display(),
                    issue.message
                )),
                None => out.line(format!("  [{}] {}", issue.severity.as_str(), issue.message)),
            }
        }
        out.blank();
    }

    out.heading("RECOMMENDATIONS");
    for (idx, recommendation) in recommendations(run).iter().enumerate() {
        out.line(format!("{}. {}", idx + 1, recommendation));
    }
    out.blank();

    out.heading("OVERALL DATASET HEALTH SCORE");
    out.line(format!("Score: {} / 100", run.overall_score()));
    out.line(format!("Status: {}", run.health_status().as_str()));
    out.line(format!(
        "Issues: {} critical, {} warning, {} info",
        run.issue_count(Severity::Critical),
        run.issue_count(Severity::Warning),
        run.issue_count(Severity::Info)
    ));
    for (check, penalty) in &run.score.per_check {
        out.line(format!("  {:<28} -{}", check, penalty));
    }
    out.blank();

    out.heading("PERFORMANCE LOG");
    for timing in &run.timings {
        out.line(format!("{:<30} : {:.4} sec", timing.check_name, timing.duration_secs));
    }
    out.blank();

    out.line("=".repeat(WIDTH));
    out.line("END OF REPORT");
    out.line("=".repeat(WIDTH));
    out.finish()
}

pub fn render_markdown(run: &PipelineRun) -> String {
    let mut out = Lines::default();

    out.line("# Dataset Health Report");
    out.blank();
    out.line(format!("- **Dataset:** `{}`", run.dataset_path.display()));
    out.line(format!("- **Scanned:** {}", run.started_at.format("%Y-%m-%d %H:%M:%S")));
    out.line(format!("- **Duration:** {:.2}s", run.duration_secs));
    out.line(format!("- **Classes:** {}", run.class_count));
    out.line(format!(
        "- **Files:** {} ({})",
        run.total_files,
        format_bytes(run.total_bytes)
    ));
    out.line(format!(
        "- **Health score:** {} / 100 ({})",
        run.overall_score(),
        run.health_status().as_str()
    ));
    out.blank();

    for result in &run.results {
        match &result.findings {
            Findings::ClassDistribution {
                classes,
                imbalance_ratio,
            } => {
                out.line("## Class Distribution");
                out.blank();
                out.line("| Class | Files | Percentage | Status |");
                out.line("|---|---:|---:|---|");
                for class in classes {
                    out.line(format!(
                        "| {} | {} | {:.1}% | {} |",
                        class.name,
                        class.count,
                        class.percentage,
                        class.health.as_str()
                    ));
                }
                out.blank();
                out.line(format!("Imbalance ratio (max / min): **{:.2}**", imbalance_ratio));
                out.blank();
            }
            Findings::Duplicates {
                groups,
                wasted_bytes,
            } => {
                out.line("## Duplicates");
                out.blank();
                out.line(format!(
                    "{} group(s), {} wasted.",
                    groups.len(),
                    format_bytes(*wasted_bytes)
                ));
                out.blank();
                for group in groups.iter().take(MAX_EXAMPLES) {
                    out.line(format!("- kept `{}`", group.kept.display()));
                    for duplicate in &group.duplicates {
                        out.line(format!("  - `{}`", duplicate.display()));
                    }
                }
                if !groups.is_empty() {
                    out.blank();
                }
            }
            Findings::CorruptFiles { files } => {
                out.line("## Corrupt Files");
                out.blank();
                if files.is_empty() {
                    out.line("None found.");
                }
                for file in files {
                    out.line(format!("- `{}`: {}", file.path.display(), file.reason));
                }
                out.blank();
            }
            Findings::Quality { flagged } => {
                out.line("## Suspicious Samples");
                out.blank();
                if flagged.is_empty() {
                    out.line("None found.");
                } else {
                    out.line("| File | Category | Stats |");
                    out.line("|---|---|---|");
                    for sample in flagged {
                        out.line(format!(
                            "| `{}` | {} | {} |",
                            sample.path.display(),
                            sample.category.label(),
                            sample_detail(&sample.stats)
                        ));
                    }
                }
                out.blank();
            }
            Findings::None => {}
        }
    }

    for result in other_results(run) {
        out.line(format!("## Check `{}`", result.check_name));
        out.blank();
        for issue in &result.issues {
            match &issue.file_path {
                Some(path) => out.line(format!(
                    "- **{}** `{}`: {}",
                    issue.severity.as_str(),
                    path.display(),
                    issue.message
                )),
                None => out.line(format!("- **{}** {}", issue.severity.as_str(), issue.message)),
            }
        }
        out.blank();
    }

    out.line("## Recommendations");
    out.blank();
    for recommendation in recommendations(run) {
        out.line(format!("- {}", recommendation));
    }
    out.blank();

    out.line("## Checks");
    out.blank();
    out.line("| Check | Status | Issues | Penalty | Time (s) |");
    out.line("|---|---|---:|---:|---:|");
    for result in &run.results {
        let penalty = run.score.per_check.get(&result.check_name).copied().unwrap_or(0);
        let seconds = run
            .timings
            .iter()
            .find(|t| t.check_name == result.check_name)
            .map_or(0.0, |t| t.duration_secs);
        out.line(format!(
            "| {} | {} | {} | {} | {:.3} |",
            result.check_name,
            result.status.as_str(),
            result.issues.len(),
            penalty,
            seconds
        ));
    }
    out.finish()
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    run: &'a PipelineRun,
    health_status: &'a str,
    recommendations: Vec<String>,
}

pub fn to_json(run: &PipelineRun) -> Result<String> {
    let status = run.health_status();
    let report = JsonReport {
        run,
        health_status: status.as_str(),
        recommendations: recommendations(run),
    };
    serde_json::to_string_pretty(&report).map_err(|e| HealthError::Io(e.to_string()))
}

/// Render `run` in `format` and write it to `path`.
pub fn save_report(run: &PipelineRun, path: &Path, format: ReportFormat) -> Result<()> {
    let contents = match format {
        ReportFormat::Markdown => render_markdown(run),
        ReportFormat::Json => to_json(run)?,
    };
    fs::write(path, contents)?;
    info!("Report saved to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthConfig;
    use crate::core::checks::Issue;
    use crate::core::dataset::DatasetTree;
    use crate::core::pipeline::Pipeline;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    fn sample_run() -> (TempDir, PipelineRun) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("cats")).unwrap();
        fs::create_dir_all(root.join("dogs")).unwrap();
        GrayImage::from_pixel(8, 8, Luma([0]))
            .save(root.join("cats/black.png"))
            .unwrap();
        fs::write(root.join("dogs/a.bin"), b"same").unwrap();
        fs::write(root.join("dogs/b.bin"), b"same").unwrap();
        fs::write(root.join("dogs/broken.png"), b"").unwrap();

        let tree = DatasetTree::build(root).unwrap();
        let run = Pipeline::new(tree, HealthConfig::default()).run_all().unwrap();
        (dir, run)
    }

    #[test]
    fn test_text_report_sections() {
        let (_dir, run) = sample_run();
        let text = render_text(&run);
        for section in [
            "CLASS DISTRIBUTION",
            "DUPLICATE FILES",
            "CORRUPT FILES",
            "SUSPICIOUS SAMPLES",
            "RECOMMENDATIONS",
            "OVERALL DATASET HEALTH SCORE",
            "PERFORMANCE LOG",
        ] {
            assert!(text.contains(section), "missing section {section}");
        }
        assert!(text.contains("black.png (very dark"));
        assert!(text.contains("broken.png (empty file)"));
    }

    #[test]
    fn test_markdown_report_has_tables() {
        let (_dir, run) = sample_run();
        let markdown = render_markdown(&run);
        assert!(markdown.starts_with("# Dataset Health Report"));
        assert!(markdown.contains("| cats | 1 |"));
        assert!(markdown.contains("## Recommendations"));
    }

    #[test]
    fn test_markdown_lists_custom_check_paths() {
        let (_dir, mut run) = sample_run();
        run.results.push(CheckResult::from_issues(
            "label_format",
            vec![
                Issue::warning("odd header").with_path("/data/dogs/a.bin"),
                Issue::warning("no labels found"),
            ],
        ));
        let markdown = render_markdown(&run);
        assert!(markdown.contains("## Check `label_format`"));
        assert!(markdown.contains("- **warning** `/data/dogs/a.bin`: odd header"));
        assert!(markdown.contains("- **warning** no labels found"));
    }

    #[test]
    fn test_json_report_round_trips_through_value() {
        let (dir, run) = sample_run();
        let path = dir.path().join(ReportFormat::Json.default_file_name());
        save_report(&run, &path, ReportFormat::Json).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["score"]["score"], run.overall_score());
        assert_eq!(value["results"].as_array().unwrap().len(), 4);
        assert!(value["recommendations"].as_array().unwrap().len() >= 3);
    }
}
