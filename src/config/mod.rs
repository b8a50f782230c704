mod health_config;

pub use health_config::{
    DecodeConfig, DuplicateConfig, HealthConfig, ImbalanceConfig, PipelineConfig, QualityConfig,
    ScoringConfig,
};
