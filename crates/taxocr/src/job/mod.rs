//! Job record model and its state machine.
//!
//! A job moves `PENDING -> PROCESSING -> {COMPLETED, FAILED}`. The only
//! backwards edge is `PROCESSING -> PENDING`, taken when a stale claim is
//! requeued.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub mod category;

pub use category::{DocumentCategory, UnknownCategory};

/// Default age after which a PROCESSING job is presumed abandoned.
pub const DEFAULT_STALE_AFTER_MINS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal edge of the state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Pending)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(other.to_string()),
        }
    }
}

/// Whether a record represents a payment made or a payment received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    Expense,
    Income,
    None,
}

impl FlowDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowDirection::Expense => "expense",
            FlowDirection::Income => "income",
            FlowDirection::None => "none",
        }
    }

    /// Parses a stream tag as emitted by the model. Accepts the English
    /// tags and the form's own wording. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "expense" | "支出" => Some(FlowDirection::Expense),
            "income" | "收入" => Some(FlowDirection::Income),
            _ => None,
        }
    }

    /// Majority vote over tags in observation order. Ties go to the value
    /// seen first; an empty input yields `None`.
    pub fn majority(tags: &[FlowDirection]) -> FlowDirection {
        let mut tally: Vec<(FlowDirection, usize)> = Vec::new();
        for tag in tags {
            match tally.iter_mut().find(|(d, _)| d == tag) {
                Some((_, count)) => *count += 1,
                None => tally.push((*tag, 1)),
            }
        }

        let mut best: Option<(FlowDirection, usize)> = None;
        for (direction, count) in tally {
            // Strictly greater keeps the first-seen value on a tie.
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((direction, count));
            }
        }
        best.map(|(d, _)| d).unwrap_or(FlowDirection::None)
    }
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current time in the canonical stored format.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// RFC 3339, UTC, microsecond precision. Fixed width so stored values
/// sort lexicographically.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// A PROCESSING job whose last update is older than `stale_after` is stale.
/// Unparseable timestamps count as stale so they cannot pin a job forever.
pub fn is_stale(updated_at: &str, now: DateTime<Utc>, stale_after: Duration) -> bool {
    match parse_timestamp(updated_at) {
        Some(at) => now - at > stale_after,
        None => true,
    }
}
