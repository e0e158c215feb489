//! Removes stored uploads of long-failed jobs. Job rows are kept.

use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::db::{job_repo, Database, DatabaseError};
use crate::job::format_timestamp;
use crate::pipeline::resolve_upload_path;
use crate::sanitize::redact_path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JanitorReport {
    pub examined: usize,
    pub removed: usize,
    /// Files that were already gone.
    pub missing: usize,
    pub errors: usize,
}

pub struct Janitor {
    db: Database,
    upload_base: PathBuf,
    retention: chrono::Duration,
}

impl Janitor {
    pub fn new(db: Database, upload_base: PathBuf, retention: chrono::Duration) -> Self {
        Self {
            db,
            upload_base,
            retention,
        }
    }

    pub fn sweep(&self) -> Result<JanitorReport, DatabaseError> {
        self.sweep_at(Utc::now())
    }

    /// Deletes the file of every FAILED job created before `now - retention`.
    /// A file that cannot be removed is logged and skipped.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<JanitorReport, DatabaseError> {
        let cutoff = format_timestamp(now - self.retention);
        let expired = job_repo::find_failed_before(&self.db, &cutoff)?;

        let mut report = JanitorReport {
            examined: expired.len(),
            ..JanitorReport::default()
        };

        for job in expired {
            let path = resolve_upload_path(&self.upload_base, &job.file_path);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!("Removed upload of failed job {}: {}", job.id, redact_path(&path));
                    report.removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => report.missing += 1,
                Err(e) => {
                    warn!(
                        "Failed to remove upload of job {} ({}): {}",
                        job.id,
                        redact_path(&path),
                        e
                    );
                    report.errors += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                "Janitor sweep: {} expired, {} removed, {} already gone, {} errors",
                report.examined, report.removed, report.missing, report.errors
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job_repo::NewJob;
    use crate::job::JobStatus;
    use tempfile::TempDir;

    fn failed_job(db: &Database, file_path: &str, created_at: &str) -> i64 {
        let mut job = NewJob::pending(1, "alice", "sales-return-a", file_path);
        job.status = JobStatus::Failed;
        job.created_at = created_at.to_string();
        job.updated_at = created_at.to_string();
        job_repo::insert(db, &job).unwrap()
    }

    fn now() -> DateTime<Utc> {
        crate::job::parse_timestamp("2026-03-01T00:00:00.000000Z").unwrap()
    }

    #[test]
    fn test_removes_only_expired_failed_uploads() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        std::fs::write(dir.path().join("old.pdf"), b"old").unwrap();
        std::fs::write(dir.path().join("recent.pdf"), b"new").unwrap();
        std::fs::write(dir.path().join("pending.pdf"), b"pending").unwrap();

        failed_job(&db, "old.pdf", "2026-01-01T00:00:00.000000Z");
        failed_job(&db, "recent.pdf", "2026-02-20T00:00:00.000000Z");
        job_repo::insert(&db, &NewJob::pending(1, "alice", "sales-return-a", "pending.pdf"))
            .unwrap();

        let janitor = Janitor::new(db.clone(), dir.path().to_path_buf(), chrono::Duration::days(30));
        let report = janitor.sweep_at(now()).unwrap();

        assert_eq!(report.examined, 1);
        assert_eq!(report.removed, 1);
        assert!(!dir.path().join("old.pdf").exists());
        assert!(dir.path().join("recent.pdf").exists());
        assert!(dir.path().join("pending.pdf").exists());
        assert_eq!(job_repo::count_by_status(&db, JobStatus::Failed).unwrap(), 2);
    }

    #[test]
    fn test_missing_file_is_counted_not_fatal() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        failed_job(&db, "gone.pdf", "2025-12-01T00:00:00.000000Z");
        std::fs::write(dir.path().join("still.pdf"), b"x").unwrap();
        failed_job(&db, "still.pdf", "2025-12-02T00:00:00.000000Z");

        let janitor = Janitor::new(db, dir.path().to_path_buf(), chrono::Duration::days(30));
        let report = janitor.sweep_at(now()).unwrap();

        assert_eq!(
            report,
            JanitorReport {
                examined: 2,
                removed: 1,
                missing: 1,
                errors: 0
            }
        );
    }
}
