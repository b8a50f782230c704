//! Health score aggregation.
//!
//! The score starts at 100. Each critical issue costs `critical_penalty`
//! and each warning costs `warning_penalty`; each kind of penalty is capped
//! separately and the result never drops below zero. Info issues are free.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ScoringConfig;
use crate::core::checks::{CheckResult, Severity};

pub const MAX_SCORE: u32 = 100;

/// How the overall score was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub score: u32,
    pub critical_issues: usize,
    pub warning_issues: usize,
    /// Critical penalty after the cap.
    pub critical_penalty: u32,
    /// Warning penalty after the cap.
    pub warning_penalty: u32,
    /// Uncapped penalty each check contributed.
    pub per_check: BTreeMap<String, u32>,
}

impl ScoreBreakdown {
    pub fn status(&self) -> HealthStatus {
        HealthStatus::from_score(self.score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    NeedsAttention,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            HealthStatus::Healthy
        } else if score >= 50 {
            HealthStatus::NeedsAttention
        } else {
            HealthStatus::Critical
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::NeedsAttention => "Needs Attention",
            HealthStatus::Critical => "Critical",
        }
    }
}

fn penalty(count: usize, per_issue: u32) -> u32 {
    u32::try_from(count)
        .unwrap_or(u32::MAX)
        .saturating_mul(per_issue)
}

pub fn compute_score(results: &[CheckResult], config: &ScoringConfig) -> ScoreBreakdown {
    let mut critical_issues = 0;
    let mut warning_issues = 0;
    let mut per_check = BTreeMap::new();

    for result in results {
        let critical = result.count(Severity::Critical);
        let warning = result.count(Severity::Warning);
        critical_issues += critical;
        warning_issues += warning;
        per_check.insert(
            result.check_name.clone(),
            penalty(critical, config.critical_penalty)
                .saturating_add(penalty(warning, config.warning_penalty)),
        );
    }

    let critical_penalty =
        penalty(critical_issues, config.critical_penalty).min(config.critical_cap);
    let warning_penalty = penalty(warning_issues, config.warning_penalty).min(config.warning_cap);
    let score = MAX_SCORE.saturating_sub(critical_penalty.saturating_add(warning_penalty));

    ScoreBreakdown {
        score,
        critical_issues,
        warning_issues,
        critical_penalty,
        warning_penalty,
        per_check,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checks::Issue;

    fn result(name: &str, issues: Vec<Issue>) -> CheckResult {
        CheckResult::from_issues(name, issues)
    }

    #[test]
    fn test_no_issues_scores_hundred() {
        let breakdown = compute_score(&[], &ScoringConfig::default());
        assert_eq!(breakdown.score, 100);

        let clean = vec![result("a", vec![Issue::info("just so you know")])];
        let breakdown = compute_score(&clean, &ScoringConfig::default());
        assert_eq!(breakdown.score, 100);
        assert_eq!(breakdown.status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_penalties_per_severity() {
        let results = vec![
            result("a", vec![Issue::critical("x"), Issue::warning("y")]),
            result("b", vec![Issue::warning("z")]),
        ];
        let breakdown = compute_score(&results, &ScoringConfig::default());
        assert_eq!(breakdown.score, 100 - 5 - 2);
        assert_eq!(breakdown.per_check["a"], 6);
        assert_eq!(breakdown.per_check["b"], 1);
    }

    #[test]
    fn test_caps_and_floor() {
        let many = vec![result(
            "a",
            (0..1000)
                .map(|_| Issue::critical("bad"))
                .chain((0..1000).map(|_| Issue::warning("meh")))
                .collect(),
        )];
        let breakdown = compute_score(&many, &ScoringConfig::default());
        assert_eq!(breakdown.critical_penalty, 60);
        assert_eq!(breakdown.warning_penalty, 30);
        assert_eq!(breakdown.score, 10);

        let harsh = ScoringConfig {
            critical_cap: 100,
            warning_cap: 100,
            ..ScoringConfig::default()
        };
        assert_eq!(compute_score(&many, &harsh).score, 0);
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(HealthStatus::from_score(80), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(79), HealthStatus::NeedsAttention);
        assert_eq!(HealthStatus::from_score(50), HealthStatus::NeedsAttention);
        assert_eq!(HealthStatus::from_score(49), HealthStatus::Critical);
    }
}
