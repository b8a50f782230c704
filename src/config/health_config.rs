use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{HealthError, Result};

/// Health check configuration.
///
/// Every value has a named default so an empty JSON object (or no config
/// file at all) runs every check with the documented thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HealthConfig {
    pub imbalance: ImbalanceConfig,
    pub duplicate: DuplicateConfig,
    pub decode: DecodeConfig,
    pub quality: QualityConfig,
    pub scoring: ScoringConfig,
    pub pipeline: PipelineConfig,
}

/// Thresholds for the class imbalance check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImbalanceConfig {
    /// A class below this fraction of the mean class count is a warning.
    pub warning_fraction: f64,
    /// A class below this fraction of the mean class count is critical.
    pub critical_fraction: f64,
    /// `max / max(min, 1)` above this fails the check.
    pub max_imbalance_ratio: f64,
}

impl Default for ImbalanceConfig {
    fn default() -> Self {
        Self {
            warning_fraction: 0.10,
            critical_fraction: 0.02,
            max_imbalance_ratio: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Zero-byte files all share one digest; leave them to the corrupt file check.
    pub skip_empty_files: bool,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            skip_empty_files: true,
        }
    }
}

/// How files are decoded and hashed. Shared by every check through the file cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Lowercase extensions decoded as images.
    pub image_extensions: Vec<String>,
    /// Lowercase extensions read as text.
    pub text_extensions: Vec<String>,
    /// Per-file decode timeout in milliseconds. Zero disables the timeout.
    pub timeout_ms: u64,
    /// Images larger than this (either side) are downscaled before pixel stats.
    pub stats_resize: Option<u32>,
    /// Bytes read per hashing step.
    pub hash_chunk_size: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            image_extensions: ["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            text_extensions: ["txt", "csv", "json"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            timeout_ms: 10_000,
            stats_resize: Some(64),
            hash_chunk_size: 8192,
        }
    }
}

impl DecodeConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Case-insensitive image extension test.
    pub fn is_image_extension(&self, ext: &str) -> bool {
        self.image_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }

    pub fn is_text_extension(&self, ext: &str) -> bool {
        self.text_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Mean intensity below this is "very dark".
    pub dark_mean: f64,
    /// Mean intensity above this is "very bright".
    pub bright_mean: f64,
    /// Intensity standard deviation below this is "flat".
    pub flat_std: f64,
    /// Also flag blank and gibberish text files.
    pub check_text: bool,
    /// Text files with a lower printable-character ratio are gibberish.
    pub min_printable_ratio: f64,
    /// Inspect at most this many files, picked with `sample_seed`.
    pub max_samples: Option<usize>,
    pub sample_seed: u64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            dark_mean: 10.0,
            bright_mean: 245.0,
            flat_std: 5.0,
            check_text: true,
            min_printable_ratio: 0.8,
            max_samples: None,
            sample_seed: 0,
        }
    }
}

/// Health score weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub critical_penalty: u32,
    pub critical_cap: u32,
    pub warning_penalty: u32,
    pub warning_cap: u32,
    /// Scores at or above this pass (CLI exit code 0).
    pub passing_score: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            critical_penalty: 5,
            critical_cap: 60,
            warning_penalty: 1,
            warning_cap: 30,
            passing_score: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run checks and per-file work on the rayon pool.
    pub parallel: bool,
    /// Follow symlinks while walking class folders.
    pub follow_symlinks: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            follow_symlinks: false,
        }
    }
}

impl HealthConfig {
    /// Load a configuration file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {:?}", path);

        let contents = fs::read_to_string(path).map_err(|e| {
            HealthError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: HealthConfig = serde_json::from_str(&contents).map_err(|e| {
            HealthError::config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;

        info!("Configuration loaded");
        Ok(config)
    }

    /// Reject threshold combinations that make the checks meaningless.
    pub fn validate(&self) -> Result<()> {
        let imbalance = &self.imbalance;
        for (name, value) in [
            ("imbalance.warning_fraction", imbalance.warning_fraction),
            ("imbalance.critical_fraction", imbalance.critical_fraction),
            ("quality.min_printable_ratio", self.quality.min_printable_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(HealthError::config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if imbalance.critical_fraction > imbalance.warning_fraction {
            return Err(HealthError::config(
                "imbalance.critical_fraction must not exceed imbalance.warning_fraction",
            ));
        }
        if imbalance.max_imbalance_ratio < 1.0 {
            return Err(HealthError::config(
                "imbalance.max_imbalance_ratio must be at least 1",
            ));
        }
        if self.quality.dark_mean >= self.quality.bright_mean {
            return Err(HealthError::config(
                "quality.dark_mean must be below quality.bright_mean",
            ));
        }
        if self.decode.hash_chunk_size == 0 {
            return Err(HealthError::config("decode.hash_chunk_size must be positive"));
        }
        if self.scoring.passing_score > 100 {
            return Err(HealthError::config("scoring.passing_score must be at most 100"));
        }
        Ok(())
    }
}
