use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, info_span, warn};

use crate::db::job_repo::{self, Claim, Completion, JobRow};
use crate::db::Database;
use crate::document::{aggregate_pages, PageResult};
use crate::error::ProcessError;
use crate::job::{is_stale, DocumentCategory, FlowDirection, JobStatus};
use crate::llm::{GenerativeExtractor, PageInput};
use crate::processor::{PageExtractor, SourceFormat};
use crate::sanitize;

use super::config::PipelineConfig;
use super::context::{JobDeadline, PipelineContext};
use super::error::PipelineError;

/// What a call to [`ExtractionWorker::process_job`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed { warnings: Vec<String> },
    AlreadyCompleted,
    AlreadyProcessing,
    AlreadyFailed,
    NotFound,
    /// The job changed hands before or while it ran; any result was dropped.
    Discarded,
    Failed { error: String },
}

/// The values a successful run hands back for persistence.
struct JobOutput {
    completion: Completion,
    warnings: Vec<String>,
}

/// Turns one job into a stored result. The only component that writes a
/// terminal status.
#[derive(Clone)]
pub struct ExtractionWorker {
    db: Database,
    pages: Arc<dyn PageExtractor>,
    extractor: Arc<GenerativeExtractor>,
    config: Arc<PipelineConfig>,
}

impl ExtractionWorker {
    pub fn new(
        db: Database,
        pages: Arc<dyn PageExtractor>,
        extractor: Arc<GenerativeExtractor>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            db,
            pages,
            extractor,
            config,
        }
    }

    /// Processes a job by id. Safe to call repeatedly and concurrently:
    /// finished jobs short-circuit, a live PROCESSING job is left to its
    /// owner, and a stale one is requeued and then claimed.
    pub fn process_job(
        &self,
        job_id: i64,
        company_name: &str,
    ) -> Result<ProcessOutcome, PipelineError> {
        let Some(job) = job_repo::find_by_id(&self.db, job_id)? else {
            return Ok(ProcessOutcome::NotFound);
        };

        match job.status {
            JobStatus::Completed => Ok(ProcessOutcome::AlreadyCompleted),
            JobStatus::Failed => Ok(ProcessOutcome::AlreadyFailed),
            JobStatus::Processing => {
                if !is_stale(&job.updated_at, chrono::Utc::now(), self.config.stale_after) {
                    return Ok(ProcessOutcome::AlreadyProcessing);
                }
                if !job_repo::requeue_if_unchanged(&self.db, job.id, &job.updated_at)? {
                    return Ok(ProcessOutcome::AlreadyProcessing);
                }
                info!(job_id, "Requeued stale job");
                self.claim_and_run(job_id, company_name)
            }
            JobStatus::Pending => self.claim_and_run(job_id, company_name),
        }
    }

    fn claim_and_run(
        &self,
        job_id: i64,
        company_name: &str,
    ) -> Result<ProcessOutcome, PipelineError> {
        match job_repo::claim_job(&self.db, job_id)? {
            Some(claim) => self.run_claimed(claim, company_name),
            None => Ok(ProcessOutcome::AlreadyProcessing),
        }
    }

    /// Hands an unstarted claim back to PENDING, e.g. when the pool shuts
    /// down with work still queued.
    pub fn release(&self, claim: &Claim) -> Result<bool, PipelineError> {
        Ok(job_repo::requeue_if_unchanged(
            &self.db,
            claim.job_id,
            &claim.claimed_at,
        )?)
    }

    /// Runs a job the caller has already claimed. The claim is re-stamped
    /// first; one that was requeued or reclaimed while it waited is dropped
    /// without any work. The work happens on its own thread; if it outlives
    /// the hard limit the job is failed and whatever the thread produces
    /// later is dropped.
    pub fn run_claimed(
        &self,
        queued: Claim,
        company_name: &str,
    ) -> Result<ProcessOutcome, PipelineError> {
        let Some(mut job) = job_repo::find_by_id(&self.db, queued.job_id)? else {
            return Ok(ProcessOutcome::NotFound);
        };
        let Some(claim) = job_repo::refresh_claim(&self.db, &queued)? else {
            info!(job_id = job.id, "Claim superseded before the job started, skipping");
            return Ok(ProcessOutcome::Discarded);
        };
        job.updated_at = claim.claimed_at.clone();

        let deadline = JobDeadline::start(self.config.soft_limit, self.config.hard_limit);
        let ctx = PipelineContext::new(job, claim.clone(), company_name, deadline);

        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker = self.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("taxocr-job-{}", claim.job_id))
            .spawn(move || {
                // The receiver is gone if the hard limit already fired.
                let _ = tx.send(worker.execute(ctx));
            });
        if let Err(e) = spawned {
            return self.record_failure(&claim, PipelineError::Thread(e.to_string()));
        }

        match rx.recv_timeout(deadline.hard_limit()) {
            Ok(Ok(output)) => self.record_success(&claim, output),
            Ok(Err(e)) => self.record_failure(&claim, e),
            Err(RecvTimeoutError::Timeout) => self.record_failure(
                &claim,
                PipelineError::HardLimitExceeded(deadline.hard_limit().as_secs()),
            ),
            Err(RecvTimeoutError::Disconnected) => self.record_failure(
                &claim,
                PipelineError::Thread("exited without a result".to_string()),
            ),
        }
    }

    fn execute(&self, mut ctx: PipelineContext) -> Result<JobOutput, PipelineError> {
        let filename = sanitize::redact_path(Path::new(&ctx.job.file_path));
        let _pipeline_span = info_span!("pipeline",
            job_id = ctx.job.id,
            category = %ctx.job.document_type,
            uploader_id = %ctx.job.uploader_id,
            filename = %filename,
        )
        .entered();

        // Step 1: Locate the upload and count its pages
        let (path, format, total_pages) = {
            let _step = info_span!("resolve_source").entered();
            self.step_resolve_source(&ctx.job)?
        };

        // Step 2: Pick the prompt group
        let category = {
            let _step = info_span!("resolve_category").entered();
            ctx.job.document_type.parse::<DocumentCategory>()?
        };

        // Step 3: OCR and extract each page in order
        {
            let _step = info_span!("extract_pages", total_pages).entered();
            self.step_extract_pages(&mut ctx, &path, format, total_pages, category)?;
        }

        // Step 4: Aggregate and derive direction / counterparty
        let _step = info_span!("aggregate").entered();
        Ok(step_aggregate(&ctx.pages, category))
    }

    fn step_resolve_source(
        &self,
        job: &JobRow,
    ) -> Result<(PathBuf, SourceFormat, usize), PipelineError> {
        let path = resolve_upload_path(&self.config.upload_base, &job.file_path);
        if !path.is_file() {
            return Err(ProcessError::FileNotFound(path).into());
        }

        let format = SourceFormat::detect(&path)?;
        let total_pages = self.pages.page_count(&path, format)?;
        debug!(?format, total_pages, "Source resolved");
        Ok((path, format, total_pages))
    }

    fn step_extract_pages(
        &self,
        ctx: &mut PipelineContext,
        path: &Path,
        format: SourceFormat,
        total_pages: usize,
        category: DocumentCategory,
    ) -> Result<(), PipelineError> {
        for page_number in 1..=total_pages {
            ctx.deadline.check_soft(ctx.pages.len())?;
            let _page = info_span!("page", page_number).entered();

            let content = self.pages.extract_page(path, format, page_number)?;
            let extracted = self.extractor.extract(
                category,
                &PageInput {
                    text: &content.text,
                    image: content.image.as_ref(),
                    company_name: &ctx.company_name,
                    voucher_count: 1,
                },
            );
            // Releases the page image before the outcome is inspected.
            drop(content);
            let payload = extracted?;

            if !payload.warnings().is_empty() {
                info!(warnings = ?payload.warnings(), "Control checks flagged the page");
            }
            ctx.pages.push(PageResult {
                page_number,
                total_pages,
                payload,
            });
        }
        Ok(())
    }

    fn record_success(
        &self,
        claim: &Claim,
        output: JobOutput,
    ) -> Result<ProcessOutcome, PipelineError> {
        if job_repo::complete_if_owned(&self.db, claim, &output.completion)? {
            info!(
                job_id = claim.job_id,
                stream = output.completion.detected_stream.as_deref().unwrap_or("none"),
                warnings = output.warnings.len(),
                "Job completed"
            );
            Ok(ProcessOutcome::Completed {
                warnings: output.warnings,
            })
        } else {
            warn!(job_id = claim.job_id, "Job changed hands while running, result discarded");
            Ok(ProcessOutcome::Discarded)
        }
    }

    fn record_failure(
        &self,
        claim: &Claim,
        error: PipelineError,
    ) -> Result<ProcessOutcome, PipelineError> {
        let message = error.to_string();
        if job_repo::fail_if_owned(&self.db, claim, &message)? {
            warn!(
                job_id = claim.job_id,
                error = %message,
                retryable = error.is_retryable(),
                "Job failed"
            );
            Ok(ProcessOutcome::Failed { error: message })
        } else {
            warn!(
                job_id = claim.job_id,
                error = %message,
                "Job changed hands while running, failure discarded"
            );
            Ok(ProcessOutcome::Discarded)
        }
    }
}

fn step_aggregate(pages: &[PageResult], category: DocumentCategory) -> JobOutput {
    let direction = detect_direction(category, pages);
    let counterparty = detect_counterparty(category, pages);
    let warnings = pages
        .iter()
        .flat_map(|p| p.payload.warnings().iter().cloned())
        .collect();

    JobOutput {
        completion: Completion {
            result_json: aggregate_pages(pages).to_string(),
            detected_stream: Some(direction.as_str().to_string()),
            detected_company_name: counterparty,
        },
        warnings,
    }
}

/// Majority stream over every page (or every record of a wrapping page),
/// ties going to the first value seen.
pub fn detect_direction(category: DocumentCategory, pages: &[PageResult]) -> FlowDirection {
    if !category.has_direction() {
        return FlowDirection::None;
    }
    let tags: Vec<FlowDirection> = pages.iter().flat_map(|p| p.payload.stream_tags()).collect();
    FlowDirection::majority(&tags)
}

/// The counterparty named on the first page.
pub fn detect_counterparty(category: DocumentCategory, pages: &[PageResult]) -> Option<String> {
    if !category.has_counterparty() {
        return None;
    }
    pages.first().and_then(|p| p.payload.counterparty())
}

/// Stored job paths are either absolute or relative to the upload base.
pub fn resolve_upload_path(upload_base: &Path, file_path: &str) -> PathBuf {
    let path = Path::new(file_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        upload_base.join(path)
    }
}
