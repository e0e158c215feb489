//! Isolated environment for running jobs end to end without OCR or network.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use taxocr::db::job_repo::{self, JobRow, NewJob};
use taxocr::db::{case_repo, Database};
use taxocr::job::{format_timestamp, JobStatus};
use taxocr::llm::{ExtractorConfig, GenerativeExtractor, ScriptedModel};
use taxocr::pipeline::{ExtractionWorker, PipelineConfig};

use super::builders::FakePages;

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub db: Database,
    pub model: Arc<ScriptedModel>,
    soft_limit: Duration,
    hard_limit: Duration,
    extractor: ExtractorConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let scratch_dir = temp_dir.path().join("scratch");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");
        std::fs::create_dir_all(&scratch_dir).expect("Failed to create scratch dir");

        Self {
            temp_dir,
            upload_dir,
            scratch_dir,
            db: Database::open_in_memory().expect("Failed to open job store"),
            model: Arc::new(ScriptedModel::new()),
            soft_limit: Duration::from_secs(60),
            hard_limit: Duration::from_secs(120),
            extractor: ExtractorConfig::default(),
        }
    }

    pub fn with_limits(mut self, soft: Duration, hard: Duration) -> Self {
        self.soft_limit = soft;
        self.hard_limit = hard;
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Queues model replies in order.
    pub fn replies(&self, replies: &[String]) {
        for reply in replies {
            self.model.push(Ok(reply.clone()));
        }
    }

    /// Writes an upload and returns the path stored on the job.
    pub fn write_upload(&self, filename: &str) -> String {
        std::fs::write(self.upload_dir.join(filename), b"%PDF-1.4 fake")
            .expect("Failed to write upload");
        filename.to_string()
    }

    pub fn add_case(&self, client_name: &str) -> i64 {
        case_repo::insert(&self.db, client_name).expect("Failed to insert case")
    }

    /// Inserts a PENDING job whose upload exists.
    pub fn add_job(&self, uploader: &str, category: &str, filename: &str) -> i64 {
        let file_path = self.write_upload(filename);
        job_repo::insert(&self.db, &NewJob::pending(1, uploader, category, &file_path))
            .expect("Failed to insert job")
    }

    /// Inserts a PENDING job without writing its upload.
    pub fn add_job_without_upload(&self, uploader: &str, category: &str, filename: &str) -> i64 {
        job_repo::insert(&self.db, &NewJob::pending(1, uploader, category, filename))
            .expect("Failed to insert job")
    }

    /// Inserts a PROCESSING job last touched `minutes_ago`.
    pub fn add_processing_job(&self, uploader: &str, category: &str, minutes_ago: i64) -> i64 {
        let file_path = self.write_upload(&format!("processing-{}.pdf", minutes_ago));
        let touched = format_timestamp(chrono::Utc::now() - chrono::Duration::minutes(minutes_ago));
        let mut job = NewJob::pending(1, uploader, category, &file_path);
        job.status = JobStatus::Processing;
        job.created_at = touched.clone();
        job.updated_at = touched;
        job_repo::insert(&self.db, &job).expect("Failed to insert job")
    }

    pub fn job(&self, id: i64) -> JobRow {
        job_repo::find_by_id(&self.db, id)
            .expect("Failed to read job")
            .expect("job exists")
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            upload_base: self.upload_dir.clone(),
            soft_limit: self.soft_limit,
            hard_limit: self.hard_limit,
            extractor: self.extractor.clone(),
            ..PipelineConfig::default()
        }
    }

    pub fn worker(&self, pages: FakePages) -> ExtractionWorker {
        self.worker_with(Arc::new(pages))
    }

    pub fn worker_with(&self, pages: Arc<FakePages>) -> ExtractionWorker {
        let extractor = Arc::new(GenerativeExtractor::new(
            self.model.clone(),
            self.extractor.clone(),
        ));
        ExtractionWorker::new(
            self.db.clone(),
            pages,
            extractor,
            Arc::new(self.pipeline_config()),
        )
    }
}
