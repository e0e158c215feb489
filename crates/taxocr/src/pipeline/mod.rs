//! The extraction worker: one claimed job, page by page, to a stored result.

pub mod config;
pub mod context;
pub mod error;
pub mod runner;

pub use config::PipelineConfig;
pub use context::{JobDeadline, PipelineContext};
pub use error::PipelineError;
pub use runner::{
    detect_counterparty, detect_direction, resolve_upload_path, ExtractionWorker, ProcessOutcome,
};
