pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod job;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod reconcile;
pub mod sanitize;
pub mod secrets;
pub mod worker;

pub use config::{load_config, Config};
pub use db::Database;
pub use document::{ExtractionPayload, PageResult};
pub use error::{ConfigError, ExtractionError, ProcessError, Result, TaxOcrError, WorkerError};
pub use job::{DocumentCategory, FlowDirection, JobStatus};
pub use llm::{AzureChatModel, GenerativeExtractor, GenerativeModel};
pub use pipeline::{ExtractionWorker, PipelineConfig, PipelineError, ProcessOutcome};
pub use processor::{OcrPageExtractor, PageExtractor, TesseractEngine};
pub use secrets::{resolve_api_key, SecretError, SecretSource};
pub use worker::{Dispatcher, Janitor, PeriodicTask, WorkerPool};
