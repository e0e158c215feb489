use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaxOcrError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to process image: {0}")]
    ImageProcessing(String),

    #[error("Failed to prepare scratch directory '{path}': {source}")]
    ScratchDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    #[error("OCR failed: {0}")]
    OcrFailed(String),
}

/// Errors raised while turning one page into a structured payload.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Model transport failed: {0}")]
    Transport(String),

    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    #[error("Model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Model output is not valid JSON: {message} (line {line}, column {column})")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Model output does not match the expected shape: {0}")]
    Shape(String),

    #[error("Model credentials unavailable: {0}")]
    Credentials(String),

    #[error("Extraction failed after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        last: Box<ExtractionError>,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Failed to spawn thread: {0}")]
    SpawnFailed(String),

    #[error("Dispatch scan failed: {0}")]
    ScanFailed(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, TaxOcrError>;
