use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use super::{Check, CheckContext, CheckError, CheckResult, CheckStatus, Findings, Issue, Severity};
use crate::config::ImbalanceConfig;

/// Health of a single class relative to the mean class size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassHealth {
    Ok,
    /// Below the warning fraction of the mean.
    LowCount,
    /// Below the critical fraction of the mean.
    Critical,
    /// No files at all.
    Empty,
}

impl ClassHealth {
    pub fn as_str(&self) -> &str {
        match self {
            ClassHealth::Ok => "OK",
            ClassHealth::LowCount => "Low Count",
            ClassHealth::Critical => "Critical",
            ClassHealth::Empty => "Empty",
        }
    }
}

/// Per-class count and share of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassShare {
    pub name: String,
    pub path: PathBuf,
    pub count: usize,
    /// Percentage of all files.
    pub percentage: f64,
    pub health: ClassHealth,
}

/// Counts files per class and flags under-represented ones.
pub struct ClassImbalanceCheck {
    config: ImbalanceConfig,
}

impl ClassImbalanceCheck {
    pub const NAME: &'static str = "class_imbalance";

    pub fn new(config: ImbalanceConfig) -> Self {
        Self { config }
    }

    /// Classify a class count against the mean class count.
    pub fn class_health(&self, count: usize, mean: f64) -> ClassHealth {
        let count = count as f64;
        if count == 0.0 {
            ClassHealth::Empty
        } else if count < self.config.critical_fraction * mean {
            ClassHealth::Critical
        } else if count < self.config.warning_fraction * mean {
            ClassHealth::LowCount
        } else {
            ClassHealth::Ok
        }
    }
}

impl Default for ClassImbalanceCheck {
    fn default() -> Self {
        Self::new(ImbalanceConfig::default())
    }
}

/// `max(count) / max(min(count), 1)`; zero when there are no classes.
pub fn imbalance_ratio(counts: &[usize]) -> f64 {
    let (Some(&max), Some(&min)) = (counts.iter().max(), counts.iter().min()) else {
        return 0.0;
    };
    max as f64 / min.max(1) as f64
}

impl Check for ClassImbalanceCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
        let classes = ctx.tree().classes();
        let counts: Vec<usize> = classes.iter().map(|class| class.file_count()).collect();
        let total: usize = counts.iter().sum();
        let mean = if classes.is_empty() {
            0.0
        } else {
            total as f64 / classes.len() as f64
        };
        let ratio = imbalance_ratio(&counts);

        let mut issues = Vec::new();
        let mut shares = Vec::with_capacity(classes.len());
        let mut result = CheckResult::from_issues(Self::NAME, Vec::new());

        for (class, &count) in classes.iter().zip(&counts) {
            let percentage = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            };
            let health = self.class_health(count, mean);

            match health {
                ClassHealth::Empty => issues.push(
                    Issue::critical(format!("class '{}' has no files", class.name))
                        .with_metric(0.0),
                ),
                ClassHealth::Critical => issues.push(
                    Issue::critical(format!(
                        "class '{}' has only {} files ({:.1}% of the mean class size)",
                        class.name,
                        count,
                        count as f64 / mean * 100.0
                    ))
                    .with_metric(count as f64),
                ),
                ClassHealth::LowCount => issues.push(
                    Issue::warning(format!(
                        "class '{}' is under-represented: {} files ({:.1}% of the mean class size)",
                        class.name,
                        count,
                        count as f64 / mean * 100.0
                    ))
                    .with_metric(count as f64),
                ),
                ClassHealth::Ok => {}
            }

            result
                .metrics
                .insert(format!("class.{}.count", class.name), count as f64);
            result
                .metrics
                .insert(format!("class.{}.percentage", class.name), percentage);
            shares.push(ClassShare {
                name: class.name.clone(),
                path: class.path.clone(),
                count,
                percentage,
                health,
            });
        }

        let failed = ratio > self.config.max_imbalance_ratio;

        let status = if failed {
            CheckStatus::Failed
        } else if issues.iter().any(|issue| issue.severity >= Severity::Warning) {
            CheckStatus::Warning
        } else {
            CheckStatus::Passed
        };

        info!(
            "Class balance: {} classes, {} files, imbalance ratio {:.2}",
            classes.len(),
            total,
            ratio
        );

        result.status = status;
        result.issues = issues;
        Ok(result
            .with_metric("imbalance_ratio", ratio)
            .with_metric("total_files", total as f64)
            .with_metric("class_count", classes.len() as f64)
            .with_findings(Findings::ClassDistribution {
                classes: shares,
                imbalance_ratio: ratio,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodeConfig;
    use crate::core::analysis::FileCache;
    use crate::core::checks::CancelToken;
    use crate::core::dataset::{ClassFolder, DatasetTree, FileEntry};

    fn tree_with_counts(counts: &[(&str, usize)]) -> DatasetTree {
        let classes = counts
            .iter()
            .map(|(name, count)| ClassFolder {
                name: name.to_string(),
                path: PathBuf::from(format!("/data/{name}")),
                files: (0..*count)
                    .map(|i| FileEntry::new(format!("/data/{name}/{i}.png"), 1))
                    .collect(),
            })
            .collect();
        DatasetTree::from_classes("/data", classes)
    }

    fn run(tree: &DatasetTree) -> CheckResult {
        let cache = FileCache::new(DecodeConfig::default());
        let cancel = CancelToken::new();
        let ctx = CheckContext::new(tree, &cache, &cancel, false);
        ClassImbalanceCheck::default().run(&ctx).unwrap()
    }

    #[test]
    fn test_balanced_dataset_passes() {
        let result = run(&tree_with_counts(&[("a", 50), ("b", 50), ("c", 45)]));
        assert_eq!(result.status, CheckStatus::Passed);
        assert!(result.issues.is_empty());
        assert!((result.metric("imbalance_ratio").unwrap() - 50.0 / 45.0).abs() < 1e-9);
        assert_eq!(result.metric("class.a.count"), Some(50.0));
    }

    #[test]
    fn test_tiny_class_among_large_ones_is_critical() {
        let mut counts: Vec<(String, usize)> =
            (0..10).map(|i| (format!("class_{i}"), 1000)).collect();
        counts.push(("rare".to_string(), 10));
        let borrowed: Vec<(&str, usize)> =
            counts.iter().map(|(n, c)| (n.as_str(), *c)).collect();

        let result = run(&tree_with_counts(&borrowed));
        assert_eq!(result.metric("imbalance_ratio"), Some(100.0));
        assert_eq!(result.status, CheckStatus::Failed);

        let rare_issue = result
            .issues
            .iter()
            .find(|issue| issue.message.contains("'rare'"))
            .unwrap();
        assert_eq!(rare_issue.severity, Severity::Critical);

        let Findings::ClassDistribution { classes, .. } = &result.findings else {
            panic!("expected class distribution findings");
        };
        let rare = classes.iter().find(|c| c.name == "rare").unwrap();
        assert_eq!(rare.health, ClassHealth::Critical);
    }

    #[test]
    fn test_empty_class_is_critical_and_ratio_uses_one() {
        let result = run(&tree_with_counts(&[("full", 5), ("empty", 0)]));
        assert_eq!(result.metric("imbalance_ratio"), Some(5.0));
        assert_eq!(result.count(Severity::Critical), 1);
        assert!(result.issues[0].message.contains("'empty'"));
        assert_eq!(result.status, CheckStatus::Warning);
    }

    #[test]
    fn test_low_count_class_is_a_warning() {
        // mean = 70, 10% of mean = 7, 2% of mean = 1.4
        let result = run(&tree_with_counts(&[("a", 100), ("b", 105), ("c", 5)]));
        assert_eq!(result.count(Severity::Warning), 1);
        assert_eq!(result.count(Severity::Critical), 0);
        assert!(result.issues[0].message.contains("'c'"));
        // ratio 21 fails the check without adding an issue of its own
        assert_eq!(result.status, CheckStatus::Failed);
    }

    #[test]
    fn test_ratio_threshold_is_configurable() {
        let tree = tree_with_counts(&[("a", 150), ("b", 10)]);
        let cache = FileCache::new(DecodeConfig::default());
        let cancel = CancelToken::new();
        let ctx = CheckContext::new(&tree, &cache, &cancel, false);

        let strict = ClassImbalanceCheck::default().run(&ctx).unwrap();
        assert_eq!(strict.status, CheckStatus::Failed);
        assert!(strict.issues.is_empty());

        let lenient = ClassImbalanceCheck::new(ImbalanceConfig {
            max_imbalance_ratio: 20.0,
            ..ImbalanceConfig::default()
        })
        .run(&ctx)
        .unwrap();
        assert_ne!(lenient.status, CheckStatus::Failed);
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let result = run(&tree_with_counts(&[("a", 1), ("b", 2), ("c", 7)]));
        let Findings::ClassDistribution { classes, .. } = &result.findings else {
            panic!("expected class distribution findings");
        };
        let sum: f64 = classes.iter().map(|c| c.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert_eq!(result.metric("total_files"), Some(10.0));
    }

    #[test]
    fn test_imbalance_ratio_helper() {
        assert_eq!(imbalance_ratio(&[]), 0.0);
        assert_eq!(imbalance_ratio(&[0, 0]), 0.0);
        assert_eq!(imbalance_ratio(&[30, 0]), 30.0);
        assert_eq!(imbalance_ratio(&[30, 15]), 2.0);
    }
}
