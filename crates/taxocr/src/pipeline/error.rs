use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{ExtractionError, ProcessError};
use crate::job::UnknownCategory;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Processing(#[from] ProcessError),

    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    #[error("{0}")]
    Category(#[from] UnknownCategory),

    #[error("Job store error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job exceeded its soft time limit of {limit_secs}s after {completed_pages} page(s)")]
    SoftLimitExceeded { limit_secs: u64, completed_pages: usize },

    #[error("Job exceeded its hard time limit of {0}s")]
    HardLimitExceeded(u64),

    #[error("Extraction thread failed: {0}")]
    Thread(String),
}

impl PipelineError {
    /// Whether a later attempt could succeed without anyone changing the job
    /// or the configuration. Retries only ever happen inside the generative
    /// client; this is for logging.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Processing(e) => !matches!(
                e,
                ProcessError::UnsupportedFormat(_)
                    | ProcessError::FileNotFound(_)
                    | ProcessError::PageOutOfRange { .. }
            ),
            PipelineError::Extraction(_) => true,
            PipelineError::Category(_) => false,
            PipelineError::Database(_) => true,
            PipelineError::SoftLimitExceeded { .. } | PipelineError::HardLimitExceeded(_) => true,
            PipelineError::Thread(_) => true,
        }
    }
}
