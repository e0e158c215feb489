//! Job repository: reads and guarded state transitions on the `jobs` table.
//!
//! Every status change is a compare-and-set. Callers learn whether they won
//! the race from the returned `bool`/`Option`, never by re-reading.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::job::{now_timestamp, JobStatus};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: i64,
    pub case_id: i64,
    pub uploader_id: String,
    /// Stored category name; parsed by the worker so that an unknown value
    /// fails the job instead of the read.
    pub document_type: String,
    pub original_filename: String,
    pub file_path: String,
    pub status: JobStatus,
    pub result_json: Option<String>,
    pub detected_stream: Option<String>,
    pub detected_company_name: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status: String = row.get("status")?;
        let status = status.parse::<JobStatus>().map_err(|value| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                Type::Text,
                format!("unknown job status '{}'", value).into(),
            )
        })?;

        Ok(Self {
            id: row.get("id")?,
            case_id: row.get("case_id")?,
            uploader_id: row.get("uploader_id")?,
            document_type: row.get("document_type")?,
            original_filename: row.get("original_filename")?,
            file_path: row.get("file_path")?,
            status,
            result_json: row.get("result_json")?,
            detected_stream: row.get("detected_stream")?,
            detected_company_name: row.get("detected_company_name")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields supplied by the upload subsystem when it creates a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub case_id: i64,
    pub uploader_id: String,
    pub document_type: String,
    pub original_filename: String,
    pub file_path: String,
    pub status: JobStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl NewJob {
    /// A PENDING job stamped with the current time.
    pub fn pending(
        case_id: i64,
        uploader_id: &str,
        document_type: &str,
        file_path: &str,
    ) -> Self {
        let now = now_timestamp();
        let original_filename = std::path::Path::new(file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_path)
            .to_string();
        Self {
            case_id,
            uploader_id: uploader_id.to_string(),
            document_type: document_type.to_string(),
            original_filename,
            file_path: file_path.to_string(),
            status: JobStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Proof of ownership of a PROCESSING job: the `updated_at` value written
/// when it was claimed. Terminal writes are conditioned on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub job_id: i64,
    pub claimed_at: String,
}

/// Values written when a job completes.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub result_json: String,
    pub detected_stream: Option<String>,
    pub detected_company_name: Option<String>,
}

/// Inserts a new job row and returns its id.
pub fn insert(db: &Database, job: &NewJob) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (case_id, uploader_id, document_type, original_filename, file_path,
             status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                job.case_id,
                job.uploader_id,
                job.document_type,
                job.original_filename,
                job.file_path,
                job.status.as_str(),
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

// ---------------------------------------------------------------------------
// Dispatcher scan. These take a `Connection` so the whole per-cycle scan and
// claim happens inside one transaction.
// ---------------------------------------------------------------------------

/// Distinct uploaders with at least one PENDING job.
pub fn pending_uploaders(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT uploader_id FROM jobs WHERE status = 'PENDING' ORDER BY uploader_id",
    )?;
    let uploaders = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(uploaders)
}

/// Number of PROCESSING jobs for one uploader.
pub fn count_processing(conn: &Connection, uploader_id: &str) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM jobs WHERE uploader_id = ?1 AND status = 'PROCESSING'",
        params![uploader_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Oldest PENDING jobs for one uploader, strict FIFO by (created_at, id).
pub fn next_pending(
    conn: &Connection,
    uploader_id: &str,
    limit: u32,
) -> Result<Vec<JobRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM jobs WHERE uploader_id = ?1 AND status = 'PENDING'
         ORDER BY created_at ASC, id ASC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![uploader_id, limit], JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// PENDING -> PROCESSING. Returns the claim if this caller won.
pub fn claim(conn: &Connection, job_id: i64) -> Result<Option<Claim>, DatabaseError> {
    let claimed_at = now_timestamp();
    let changed = conn.execute(
        "UPDATE jobs SET status = 'PROCESSING', updated_at = ?2
         WHERE id = ?1 AND status = 'PENDING'",
        params![job_id, claimed_at],
    )?;
    Ok((changed == 1).then_some(Claim { job_id, claimed_at }))
}

/// Claims a single job outside a dispatcher transaction.
pub fn claim_job(db: &Database, job_id: i64) -> Result<Option<Claim>, DatabaseError> {
    db.with_conn(|conn| claim(conn, job_id))
}

/// Re-stamps a claim when a worker actually starts on it, so the stale clock
/// measures running time rather than time spent queued. Returns the claim to
/// carry from here on, or `None` if the job was requeued or reclaimed since.
pub fn refresh_claim(db: &Database, claim: &Claim) -> Result<Option<Claim>, DatabaseError> {
    db.with_conn(|conn| {
        let refreshed_at = now_timestamp();
        let changed = conn.execute(
            "UPDATE jobs SET updated_at = ?3
             WHERE id = ?1 AND status = 'PROCESSING' AND updated_at = ?2",
            params![claim.job_id, claim.claimed_at, refreshed_at],
        )?;
        Ok((changed == 1).then(|| Claim {
            job_id: claim.job_id,
            claimed_at: refreshed_at,
        }))
    })
}

// ---------------------------------------------------------------------------
// Stale recovery
// ---------------------------------------------------------------------------

/// PROCESSING jobs whose `updated_at` is strictly before `cutoff`.
pub fn find_stale_processing(db: &Database, cutoff: &str) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE status = 'PROCESSING' AND updated_at < ?1
             ORDER BY updated_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![cutoff], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// PROCESSING -> PENDING, only if the row still carries the `updated_at`
/// observed when it was judged stale.
pub fn requeue_if_unchanged(
    db: &Database,
    job_id: i64,
    observed_updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'PENDING', updated_at = ?3
             WHERE id = ?1 AND status = 'PROCESSING' AND updated_at = ?2",
            params![job_id, observed_updated_at, now_timestamp()],
        )?;
        Ok(changed == 1)
    })
}

// ---------------------------------------------------------------------------
// Terminal writes
// ---------------------------------------------------------------------------

/// PROCESSING -> COMPLETED for the holder of `claim`. Returns `false` when
/// the job has moved on (requeued, reclaimed, or failed by a timeout), in
/// which case nothing is written.
pub fn complete_if_owned(
    db: &Database,
    claim: &Claim,
    completion: &Completion,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'COMPLETED', result_json = ?3, detected_stream = ?4,
             detected_company_name = ?5, error_message = NULL, updated_at = ?6
             WHERE id = ?1 AND status = 'PROCESSING' AND updated_at = ?2",
            params![
                claim.job_id,
                claim.claimed_at,
                completion.result_json,
                completion.detected_stream,
                completion.detected_company_name,
                now_timestamp(),
            ],
        )?;
        Ok(changed == 1)
    })
}

/// PROCESSING -> FAILED for the holder of `claim`. The result column is
/// left untouched.
pub fn fail_if_owned(db: &Database, claim: &Claim, message: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'FAILED', error_message = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'PROCESSING' AND updated_at = ?2",
            params![claim.job_id, claim.claimed_at, message, now_timestamp()],
        )?;
        Ok(changed == 1)
    })
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

/// FAILED jobs created strictly before `cutoff`.
pub fn find_failed_before(db: &Database, cutoff: &str) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE status = 'FAILED' AND created_at < ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![cutoff], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
