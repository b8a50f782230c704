use crate::core::checks::{CheckStatus, ClassHealth, Findings, QualityCategory};
use crate::core::pipeline::PipelineRun;

/// Format a byte count with a binary unit (e.g., "1.5 MB").
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Generate recommendations from a finished run.
pub fn recommendations(run: &PipelineRun) -> Vec<String> {
    let mut recommendations = Vec::new();

    if run.total_files == 0 {
        recommendations.push("No files found in dataset.".to_string());
        return recommendations;
    }

    for result in &run.results {
        match &result.findings {
            Findings::ClassDistribution {
                classes,
                imbalance_ratio,
            } => {
                for class in classes {
                    match class.health {
                        ClassHealth::Empty => recommendations.push(format!(
                            "📈 Add samples to the empty class '{}' or remove the folder",
                            class.name
                        )),
                        ClassHealth::Critical | ClassHealth::LowCount => {
                            recommendations.push(format!(
                                "📈 Collect more samples for '{}' (currently {} file{}, {:.1}%)",
                                class.name,
                                class.count,
                                plural(class.count),
                                class.percentage
                            ))
                        }
                        ClassHealth::Ok => {}
                    }
                }
                if result.status == CheckStatus::Failed {
                    recommendations.push(format!(
                        "⚖ Rebalance classes: the largest class is {:.1}x the smallest",
                        imbalance_ratio
                    ));
                }
            }
            Findings::Duplicates {
                groups,
                wasted_bytes,
            } if !groups.is_empty() => {
                let files: usize = groups.iter().map(|g| g.duplicates.len()).sum();
                recommendations.push(format!(
                    "📉 Remove {} duplicate file{} to reclaim {} (or run with --clean)",
                    files,
                    plural(files),
                    format_bytes(*wasted_bytes)
                ));
            }
            Findings::CorruptFiles { files } if !files.is_empty() => {
                recommendations.push(format!(
                    "🔍 Inspect or remove {} corrupt file{}",
                    files.len(),
                    plural(files.len())
                ));
            }
            Findings::Quality { flagged } if !flagged.is_empty() => {
                let breakdown: Vec<String> = QualityCategory::ALL
                    .iter()
                    .filter_map(|category| {
                        let count = flagged.iter().filter(|s| s.category == *category).count();
                        (count > 0).then(|| format!("{} {}", count, category.label()))
                    })
                    .collect();
                recommendations.push(format!(
                    "🔍 Review {} suspicious sample{} ({})",
                    flagged.len(),
                    plural(flagged.len()),
                    breakdown.join(", ")
                ));
            }
            _ => {}
        }
    }

    if recommendations.is_empty() {
        recommendations.push("✓ No action needed, the dataset looks healthy".to_string());
    }
    recommendations
}
