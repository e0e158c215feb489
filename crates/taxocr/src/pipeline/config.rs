use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::llm::ExtractorConfig;

pub struct PipelineConfig {
    pub upload_base: PathBuf,
    pub stale_after: chrono::Duration,
    pub soft_limit: Duration,
    pub hard_limit: Duration,
    pub extractor: ExtractorConfig,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_base: PathBuf::from(&config.upload_base),
            stale_after: chrono::Duration::minutes(config.dispatcher.stale_after_mins),
            soft_limit: Duration::from_secs(config.limits.soft_limit_secs),
            hard_limit: Duration::from_secs(config.limits.hard_limit_secs),
            extractor: ExtractorConfig {
                max_attempts: config.model.max_attempts,
                max_image_bytes: config.model.max_image_bytes,
                zero_rate_fallback: config.extraction.zero_rate_fallback,
            },
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_base: PathBuf::from("."),
            stale_after: chrono::Duration::minutes(crate::job::DEFAULT_STALE_AFTER_MINS),
            soft_limit: Duration::from_secs(14 * 60),
            hard_limit: Duration::from_secs(15 * 60),
            extractor: ExtractorConfig::default(),
        }
    }
}
