use std::time::{Duration, Instant};

use crate::db::job_repo::{Claim, JobRow};
use crate::document::PageResult;

use super::error::PipelineError;

/// Wall-clock budget of one job. The soft limit is checked between pages so
/// the job can stop cleanly; the hard limit is enforced by the caller that
/// waits on the job.
#[derive(Debug, Clone, Copy)]
pub struct JobDeadline {
    started: Instant,
    soft: Duration,
    hard: Duration,
}

impl JobDeadline {
    pub fn start(soft: Duration, hard: Duration) -> Self {
        Self {
            started: Instant::now(),
            soft,
            hard,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn hard_limit(&self) -> Duration {
        self.hard
    }

    pub fn check_soft(&self, completed_pages: usize) -> Result<(), PipelineError> {
        if self.elapsed() >= self.soft {
            return Err(PipelineError::SoftLimitExceeded {
                limit_secs: self.soft.as_secs(),
                completed_pages,
            });
        }
        Ok(())
    }
}

/// State accumulated while one claimed job is processed.
pub struct PipelineContext {
    pub job: JobRow,
    pub claim: Claim,
    pub company_name: String,
    pub deadline: JobDeadline,
    /// Page results in page order.
    pub pages: Vec<PageResult>,
}

impl PipelineContext {
    pub fn new(job: JobRow, claim: Claim, company_name: &str, deadline: JobDeadline) -> Self {
        Self {
            job,
            claim,
            company_name: company_name.to_string(),
            deadline,
            pages: Vec::new(),
        }
    }
}
