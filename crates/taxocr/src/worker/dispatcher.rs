//! Periodic dispatch of PENDING jobs under a per-uploader concurrency cap.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::DispatcherConfig;
use crate::db::job_repo::{self, Claim};
use crate::db::{case_repo, Database, DatabaseError};
use crate::error::WorkerError;
use crate::job::{format_timestamp, DEFAULT_STALE_AFTER_MINS};

use super::pool::{DispatchedJob, JobSubmitter};

/// Resolves the company-name hint for a job from its parent case.
pub trait CaseDirectory: Send + Sync {
    fn company_name(&self, case_id: i64) -> Result<Option<String>, DatabaseError>;
}

/// Reads client names from the `cases` table.
pub struct DbCaseDirectory {
    db: Database,
}

impl DbCaseDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl CaseDirectory for DbCaseDirectory {
    fn company_name(&self, case_id: i64) -> Result<Option<String>, DatabaseError> {
        case_repo::client_name(&self.db, case_id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    /// No uploader may have more than this many jobs PROCESSING.
    pub max_jobs_per_uploader: u32,
    pub stale_after: chrono::Duration,
}

impl DispatchPolicy {
    pub fn from_config(config: &DispatcherConfig) -> Self {
        Self {
            max_jobs_per_uploader: config.max_jobs_per_uploader,
            stale_after: chrono::Duration::minutes(config.stale_after_mins),
        }
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_jobs_per_uploader: 8,
            stale_after: chrono::Duration::minutes(DEFAULT_STALE_AFTER_MINS),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Stale PROCESSING jobs moved back to PENDING.
    pub requeued: usize,
    /// Uploaders with pending work this cycle.
    pub uploaders: usize,
    pub submitted: usize,
}

pub struct Dispatcher {
    db: Database,
    submitter: Arc<dyn JobSubmitter>,
    cases: Arc<dyn CaseDirectory>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(
        db: Database,
        submitter: Arc<dyn JobSubmitter>,
        cases: Arc<dyn CaseDirectory>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            db,
            submitter,
            cases,
            policy,
        }
    }

    /// One dispatch cycle. Idempotent: jobs are claimed before submission,
    /// so a repeated call never hands the same job out twice.
    pub fn dispatch(&self) -> Result<DispatchReport, WorkerError> {
        let requeued = self.requeue_stale()?;
        let (uploaders, claimed) = self.claim_batch()?;

        let mut submitted = 0;
        for (claim, case_id) in claimed {
            let company_name = self.company_name(case_id);
            let job_id = claim.job_id;
            let job = DispatchedJob {
                claim: claim.clone(),
                company_name,
            };

            match self.submitter.submit(job) {
                Ok(()) => submitted += 1,
                Err(e) => {
                    warn!("Failed to submit job {}: {}", job_id, e);
                    self.release(&claim);
                }
            }
        }

        let report = DispatchReport {
            requeued,
            uploaders,
            submitted,
        };
        if report.submitted > 0 || report.requeued > 0 {
            info!(
                "Dispatch: {} submitted across {} uploader(s), {} stale requeued",
                report.submitted, report.uploaders, report.requeued
            );
        }
        Ok(report)
    }

    fn requeue_stale(&self) -> Result<usize, WorkerError> {
        let cutoff = format_timestamp(chrono::Utc::now() - self.policy.stale_after);
        let stale = job_repo::find_stale_processing(&self.db, &cutoff)?;

        let mut requeued = 0;
        for job in stale {
            if job_repo::requeue_if_unchanged(&self.db, job.id, &job.updated_at)? {
                info!("Requeued stale job {} (last update {})", job.id, job.updated_at);
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    /// Counts and claims inside a single transaction so the per-uploader cap
    /// sees the claims made earlier in the same cycle.
    fn claim_batch(&self) -> Result<(usize, Vec<(Claim, i64)>), WorkerError> {
        let cap = self.policy.max_jobs_per_uploader;
        let batch = self.db.with_transaction(|conn| {
            let uploaders = job_repo::pending_uploaders(conn)?;
            let mut claimed = Vec::new();

            for uploader in &uploaders {
                let processing = job_repo::count_processing(conn, uploader)?;
                let available = cap.saturating_sub(processing);
                if available == 0 {
                    debug!("Uploader {} at capacity ({} processing)", uploader, processing);
                    continue;
                }

                for job in job_repo::next_pending(conn, uploader, available)? {
                    if let Some(claim) = job_repo::claim(conn, job.id)? {
                        claimed.push((claim, job.case_id));
                    }
                }
            }
            Ok((uploaders.len(), claimed))
        })?;
        Ok(batch)
    }

    fn company_name(&self, case_id: i64) -> String {
        match self.cases.company_name(case_id) {
            Ok(name) => name.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to resolve company name for case {}: {}", case_id, e);
                String::new()
            }
        }
    }

    fn release(&self, claim: &Claim) {
        if let Err(e) = job_repo::requeue_if_unchanged(&self.db, claim.job_id, &claim.claimed_at) {
            warn!("Failed to release job {}: {}", claim.job_id, e);
        }
    }
}
