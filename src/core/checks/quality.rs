use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use super::{Check, CheckContext, CheckError, CheckResult, Findings, Issue};
use crate::config::QualityConfig;
use crate::core::analysis::{ContentKind, Decoded, PixelStats, TextStats};
use crate::core::dataset::FileEntry;

/// Why a sample looks suspicious. A file gets at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCategory {
    VeryDark,
    VeryBright,
    Flat,
    EmptyText,
    GibberishText,
}

impl QualityCategory {
    pub const ALL: [QualityCategory; 5] = [
        QualityCategory::VeryDark,
        QualityCategory::VeryBright,
        QualityCategory::Flat,
        QualityCategory::EmptyText,
        QualityCategory::GibberishText,
    ];

    /// Metric key for the per-category count.
    pub fn key(&self) -> &'static str {
        match self {
            QualityCategory::VeryDark => "very_dark",
            QualityCategory::VeryBright => "very_bright",
            QualityCategory::Flat => "flat",
            QualityCategory::EmptyText => "empty_text",
            QualityCategory::GibberishText => "gibberish_text",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityCategory::VeryDark => "very dark",
            QualityCategory::VeryBright => "very bright",
            QualityCategory::Flat => "near-empty / flat",
            QualityCategory::EmptyText => "empty text",
            QualityCategory::GibberishText => "gibberish text",
        }
    }
}

/// The statistics a classification was made from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleStats {
    Pixels { mean: f64, std: f64 },
    Text { printable_ratio: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedSample {
    pub path: PathBuf,
    pub category: QualityCategory,
    pub stats: SampleStats,
}

/// Dark, then bright, then flat. First match wins.
pub fn classify_image(stats: &PixelStats, config: &QualityConfig) -> Option<QualityCategory> {
    if stats.mean < config.dark_mean {
        Some(QualityCategory::VeryDark)
    } else if stats.mean > config.bright_mean {
        Some(QualityCategory::VeryBright)
    } else if stats.std < config.flat_std {
        Some(QualityCategory::Flat)
    } else {
        None
    }
}

pub fn classify_text(stats: &TextStats, config: &QualityConfig) -> Option<QualityCategory> {
    if stats.is_blank() {
        Some(QualityCategory::EmptyText)
    } else if stats.printable_ratio < config.min_printable_ratio {
        Some(QualityCategory::GibberishText)
    } else {
        None
    }
}

/// Flags images with extreme or flat intensity, and blank or garbled text.
///
/// Files that fail to decode are excluded here; reporting them is the
/// corrupt file check's job.
pub struct QualityCheck {
    config: QualityConfig,
}

impl QualityCheck {
    pub const NAME: &'static str = "quality";

    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Candidates in traversal order, reduced to `max_samples` with a seeded RNG.
    /// The cap counts candidates, so a sampled file that then fails to decode
    /// is still part of the sample and shows up as excluded.
    fn select_samples<'a>(&self, candidates: Vec<&'a FileEntry>) -> Vec<&'a FileEntry> {
        let Some(limit) = self.config.max_samples else {
            return candidates;
        };
        if candidates.len() <= limit {
            return candidates;
        }

        let mut rng = StdRng::seed_from_u64(self.config.sample_seed);
        let mut picked = rand::seq::index::sample(&mut rng, candidates.len(), limit).into_vec();
        picked.sort_unstable();
        debug!("Sampling {} of {} quality candidates", limit, candidates.len());
        picked.into_iter().map(|i| candidates[i]).collect()
    }

    fn classify(&self, decoded: &Decoded) -> Option<(QualityCategory, SampleStats)> {
        match decoded {
            Decoded::Image(stats) => classify_image(stats, &self.config).map(|category| {
                (
                    category,
                    SampleStats::Pixels {
                        mean: stats.mean,
                        std: stats.std,
                    },
                )
            }),
            Decoded::Text(stats) if self.config.check_text => {
                classify_text(stats, &self.config).map(|category| {
                    (
                        category,
                        SampleStats::Text {
                            printable_ratio: stats.printable_ratio,
                        },
                    )
                })
            }
            _ => None,
        }
    }
}

impl Default for QualityCheck {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

impl Check for QualityCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
        let cache = ctx.cache();
        let candidates: Vec<&FileEntry> = ctx
            .tree()
            .files()
            .filter(|file| match cache.content_kind(file) {
                ContentKind::Image => true,
                ContentKind::Text => self.config.check_text,
                ContentKind::Other => false,
            })
            .collect();
        let samples = self.select_samples(candidates);

        let outcomes = ctx.map_files(&samples, |file| ctx.decode(file))?;

        let mut flagged = Vec::new();
        let mut images = 0usize;
        let mut texts = 0usize;
        let mut excluded = 0usize;

        for (file, outcome) in samples.iter().zip(outcomes) {
            let decoded = match outcome {
                Ok(decoded) => decoded,
                Err(_) => {
                    excluded += 1;
                    continue;
                }
            };
            match decoded {
                Decoded::Image(_) => images += 1,
                Decoded::Text(_) => texts += 1,
                Decoded::Opaque { .. } => {}
            }
            if let Some((category, stats)) = self.classify(&decoded) {
                flagged.push(FlaggedSample {
                    path: file.path.clone(),
                    category,
                    stats,
                });
            }
        }

        // An issue's metric_value is the mean (or printable ratio); the full
        // (mean, std) pair lives in the findings' FlaggedSample::stats.
        let issues: Vec<Issue> = flagged
            .iter()
            .map(|sample| {
                let issue = match sample.stats {
                    SampleStats::Pixels { mean, std } => Issue::warning(format!(
                        "{} image (mean {:.1}, std {:.1})",
                        sample.category.label(),
                        mean,
                        std
                    ))
                    .with_metric(mean),
                    SampleStats::Text { printable_ratio } => Issue::warning(format!(
                        "{} ({:.0}% printable)",
                        sample.category.label(),
                        printable_ratio * 100.0
                    ))
                    .with_metric(printable_ratio),
                };
                issue.with_path(&sample.path)
            })
            .collect();

        let mut result = CheckResult::from_issues(Self::NAME, issues);
        for category in QualityCategory::ALL {
            let count = flagged.iter().filter(|s| s.category == category).count();
            result = result.with_metric(category.key(), count as f64);
        }

        info!(
            "Quality scan: {} images and {} text files inspected, {} flagged, {} excluded",
            images,
            texts,
            flagged.len(),
            excluded
        );

        Ok(result
            .with_metric("images_inspected", images as f64)
            .with_metric("texts_inspected", texts as f64)
            .with_metric("excluded", excluded as f64)
            .with_findings(Findings::Quality { flagged }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodeConfig;
    use crate::core::analysis::FileCache;
    use crate::core::checks::{CancelToken, CheckStatus, Severity};
    use crate::core::dataset::DatasetTree;
    use image::{GrayImage, Luma};
    use std::fs;
    use tempfile::TempDir;

    fn run_with(tree: &DatasetTree, check: &QualityCheck) -> CheckResult {
        let cache = FileCache::new(DecodeConfig::default());
        let cancel = CancelToken::new();
        let ctx = CheckContext::new(tree, &cache, &cancel, true);
        check.run(&ctx).unwrap()
    }

    fn pixels(mean: f64, std: f64) -> PixelStats {
        PixelStats {
            mean,
            std,
            width: 10,
            height: 10,
        }
    }

    #[test]
    fn test_classification_order() {
        let config = QualityConfig::default();
        assert_eq!(
            classify_image(&pixels(0.0, 0.0), &config),
            Some(QualityCategory::VeryDark)
        );
        assert_eq!(
            classify_image(&pixels(255.0, 0.0), &config),
            Some(QualityCategory::VeryBright)
        );
        assert_eq!(
            classify_image(&pixels(128.0, 1.0), &config),
            Some(QualityCategory::Flat)
        );
        assert_eq!(classify_image(&pixels(128.0, 40.0), &config), None);
    }

    #[test]
    fn test_text_classification() {
        let config = QualityConfig::default();
        let blank = TextStats {
            chars: 0,
            printable_ratio: 0.0,
        };
        let noisy = TextStats {
            chars: 100,
            printable_ratio: 0.3,
        };
        let fine = TextStats {
            chars: 100,
            printable_ratio: 1.0,
        };
        assert_eq!(classify_text(&blank, &config), Some(QualityCategory::EmptyText));
        assert_eq!(classify_text(&noisy, &config), Some(QualityCategory::GibberishText));
        assert_eq!(classify_text(&fine, &config), None);
    }

    #[test]
    fn test_black_image_is_dark_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("night")).unwrap();
        GrayImage::from_pixel(100, 100, Luma([0]))
            .save(dir.path().join("night/black.png"))
            .unwrap();

        let tree = DatasetTree::build(dir.path()).unwrap();
        let result = run_with(&tree, &QualityCheck::default());

        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::Warning);
        assert_eq!(result.issues[0].metric_value, Some(0.0));
        assert_eq!(result.metric("very_dark"), Some(1.0));
        assert_eq!(result.metric("flat"), Some(0.0));
        assert_eq!(result.status, CheckStatus::Warning);

        let Findings::Quality { flagged } = &result.findings else {
            panic!("expected quality findings");
        };
        assert_eq!(flagged[0].stats, SampleStats::Pixels { mean: 0.0, std: 0.0 });
        assert!(result.issues[0].message.contains("std 0.0"));
    }

    #[test]
    fn test_zero_byte_file_is_excluded() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/empty.png"), b"").unwrap();

        let tree = DatasetTree::build(dir.path()).unwrap();
        let result = run_with(&tree, &QualityCheck::default());

        assert!(result.issues.is_empty());
        assert_eq!(result.metric("excluded"), Some(1.0));
        assert_eq!(result.metric("images_inspected"), Some(0.0));
    }

    #[test]
    fn test_text_files_flagged_when_enabled() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes/blank.txt"), b"   \n\n").unwrap();
        fs::write(dir.path().join("notes/noise.txt"), [0x01u8; 64]).unwrap();
        fs::write(dir.path().join("notes/fine.txt"), b"a perfectly normal sentence").unwrap();

        let tree = DatasetTree::build(dir.path()).unwrap();
        let result = run_with(&tree, &QualityCheck::default());
        assert_eq!(result.metric("empty_text"), Some(1.0));
        assert_eq!(result.metric("gibberish_text"), Some(1.0));
        assert_eq!(result.metric("texts_inspected"), Some(3.0));

        let text_off = QualityCheck::new(QualityConfig {
            check_text: false,
            ..QualityConfig::default()
        });
        let result = run_with(&tree, &text_off);
        assert!(result.issues.is_empty());
        assert_eq!(result.metric("texts_inspected"), Some(0.0));
    }

    #[test]
    fn test_sampling_is_reproducible() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        for i in 0..12u8 {
            GrayImage::from_pixel(4, 4, Luma([i]))
                .save(dir.path().join(format!("a/{i:02}.png")))
                .unwrap();
        }
        let tree = DatasetTree::build(dir.path()).unwrap();
        let check = QualityCheck::new(QualityConfig {
            max_samples: Some(5),
            sample_seed: 7,
            ..QualityConfig::default()
        });

        let first = run_with(&tree, &check);
        let second = run_with(&tree, &check);
        assert_eq!(first.metric("images_inspected"), Some(5.0));
        assert_eq!(first.findings, second.findings);
    }

    #[test]
    fn test_sample_cap_counts_undecodable_candidates() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        for i in 0..6u8 {
            GrayImage::from_pixel(4, 4, Luma([i]))
                .save(dir.path().join(format!("a/ok_{i}.png")))
                .unwrap();
            fs::write(dir.path().join(format!("a/bad_{i}.png")), b"not a png").unwrap();
        }
        let tree = DatasetTree::build(dir.path()).unwrap();
        let check = QualityCheck::new(QualityConfig {
            max_samples: Some(4),
            ..QualityConfig::default()
        });

        let result = run_with(&tree, &check);
        let inspected = result.metric("images_inspected").unwrap();
        let excluded = result.metric("excluded").unwrap();
        assert_eq!(inspected + excluded, 4.0);
    }
}
