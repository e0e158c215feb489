use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database_path: Option<String>,
    /// Base directory that relative job file paths are resolved against.
    #[serde(default = "default_upload_base")]
    pub upload_base: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_upload_base() -> String {
    ".".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound on one uploader's PROCESSING jobs.
    #[serde(default = "default_max_jobs_per_uploader")]
    pub max_jobs_per_uploader: u32,
    #[serde(default = "default_stale_after_mins")]
    pub stale_after_mins: i64,
}

fn default_interval_secs() -> u64 {
    3
}

fn default_max_jobs_per_uploader() -> u32 {
    8
}

fn default_stale_after_mins() -> i64 {
    crate::job::DEFAULT_STALE_AFTER_MINS
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_jobs_per_uploader: default_max_jobs_per_uploader(),
            stale_after_mins: default_stale_after_mins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_soft_limit_secs")]
    pub soft_limit_secs: u64,
    #[serde(default = "default_hard_limit_secs")]
    pub hard_limit_secs: u64,
}

fn default_soft_limit_secs() -> u64 {
    14 * 60
}

fn default_hard_limit_secs() -> u64 {
    15 * 60
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            soft_limit_secs: default_soft_limit_secs(),
            hard_limit_secs: default_hard_limit_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Where rasterised pages are written. Defaults to the system temp dir.
    #[serde(default)]
    pub scratch_dir: Option<String>,
}

fn default_languages() -> Vec<String> {
    vec!["chi_tra".to_string(), "eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            dpi: default_dpi(),
            scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Base64 budget for the page image; larger pages are sent text-only.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

fn default_deployment() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_api_version() -> String {
    "2024-12-01-preview".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("AZURE_OPENAI_KEY".to_string())
}

fn default_max_tokens() -> u32 {
    9000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_max_image_bytes() -> usize {
    crate::llm::extractor::DEFAULT_MAX_IMAGE_BYTES
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: default_deployment(),
            api_version: default_api_version(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Re-reads sub-form B zero-rate amounts from the OCR text and
    /// overrides the model when they disagree.
    #[serde(default)]
    pub zero_rate_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_failed_retention_days")]
    pub failed_retention_days: i64,
    #[serde(default = "default_janitor_interval_hours")]
    pub janitor_interval_hours: u64,
}

fn default_failed_retention_days() -> i64 {
    30
}

fn default_janitor_interval_hours() -> u64 {
    24
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            failed_retention_days: default_failed_retention_days(),
            janitor_interval_hours: default_janitor_interval_hours(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
