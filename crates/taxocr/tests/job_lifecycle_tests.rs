//! Job state machine behaviour of `ExtractionWorker`: idempotent entry,
//! stale recovery, time limits and ownership of terminal writes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use taxocr::db::job_repo;
use taxocr::error::ExtractionError;
use taxocr::job::{format_timestamp, JobStatus};
use taxocr::pipeline::ProcessOutcome;

#[test]
fn test_completed_job_is_not_reprocessed() {
    let h = TestHarness::new();
    let id = h.add_job("alice", "sales-return-a", "401.pdf");
    h.replies(&[sales_return_reply(180)]);
    let worker = h.worker(FakePages::new());

    let first = worker.process_job(id, "Acme Trading Co.").unwrap();
    assert_eq!(first, ProcessOutcome::Completed { warnings: vec![] });

    let second = worker.process_job(id, "Acme Trading Co.").unwrap();
    assert_eq!(second, ProcessOutcome::AlreadyCompleted);
    assert_eq!(h.model.requests().len(), 1);
    assert_eq!(h.job(id).status, JobStatus::Completed);
}

#[test]
fn test_failed_job_stays_failed() {
    let h = TestHarness::new();
    let id = h.add_job_without_upload("alice", "sales-return-a", "missing.pdf");
    let worker = h.worker(FakePages::new());

    match worker.process_job(id, "").unwrap() {
        ProcessOutcome::Failed { error } => assert!(error.contains("File not found")),
        other => panic!("Expected Failed, got {:?}", other),
    }

    let job = h.job(id);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("missing.pdf"));
    assert!(job.result_json.is_none());

    assert_eq!(worker.process_job(id, "").unwrap(), ProcessOutcome::AlreadyFailed);
    assert!(h.model.requests().is_empty());
}

#[test]
fn test_unknown_job_id() {
    let h = TestHarness::new();
    let worker = h.worker(FakePages::new());
    assert_eq!(worker.process_job(4242, "").unwrap(), ProcessOutcome::NotFound);
}

#[test]
fn test_unsupported_format_fails_without_model_call() {
    let h = TestHarness::new();
    let id = h.add_job("alice", "withholding-certificate", "statement.docx");
    let worker = h.worker(FakePages::new());

    match worker.process_job(id, "").unwrap() {
        ProcessOutcome::Failed { error } => {
            assert_eq!(error, "Unsupported document format: docx")
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
    assert!(h.model.requests().is_empty());
}

#[test]
fn test_unknown_category_fails() {
    let h = TestHarness::new();
    let id = h.add_job("alice", "balance-sheet", "sheet.pdf");
    let worker = h.worker(FakePages::new());

    match worker.process_job(id, "").unwrap() {
        ProcessOutcome::Failed { error } => assert!(error.contains("balance-sheet")),
        other => panic!("Expected Failed, got {:?}", other),
    }
    assert_eq!(h.job(id).status, JobStatus::Failed);
}

#[test]
fn test_exhausted_model_fails_the_job() {
    let h = TestHarness::new();
    let id = h.add_job("alice", "withholding-summary", "summary.pdf");
    h.replies(&["no json here".to_string()]);
    h.model.push(Err(ExtractionError::Timeout(300)));
    let worker = h.worker(FakePages::new());

    match worker.process_job(id, "").unwrap() {
        ProcessOutcome::Failed { error } => {
            assert!(error.contains("after 2 attempt(s)"));
            assert!(error.contains("timed out"));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
}

#[test]
fn test_stale_processing_job_is_recovered() {
    let h = TestHarness::new();
    let id = h.add_processing_job("alice", "withholding-certificate", 31);
    h.replies(&[certificate_reply("income", "Payer", 1000)]);
    let worker = h.worker(FakePages::new());

    let outcome = worker.process_job(id, "").unwrap();
    assert!(matches!(outcome, ProcessOutcome::Completed { .. }));
    assert_eq!(h.job(id).status, JobStatus::Completed);
}

#[test]
fn test_fresh_processing_job_is_left_alone() {
    let h = TestHarness::new();
    let id = h.add_processing_job("alice", "withholding-certificate", 10);
    let before = h.job(id);
    let worker = h.worker(FakePages::new());

    assert_eq!(worker.process_job(id, "").unwrap(), ProcessOutcome::AlreadyProcessing);

    let after = h.job(id);
    assert_eq!(after.status, JobStatus::Processing);
    assert_eq!(after.updated_at, before.updated_at);
    assert!(h.model.requests().is_empty());
}

#[test]
fn test_hard_limit_fails_the_job() {
    let h = TestHarness::new().with_limits(Duration::from_secs(30), Duration::from_millis(300));
    let id = h.add_job("alice", "withholding-certificate", "slow.pdf");
    let worker = h.worker(FakePages::new().delay(Duration::from_secs(2)));

    let started = std::time::Instant::now();
    let outcome = worker.process_job(id, "").unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    match outcome {
        ProcessOutcome::Failed { error } => assert!(error.contains("hard time limit")),
        other => panic!("Expected Failed, got {:?}", other),
    }
    let job = h.job(id);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.result_json.is_none());
}

#[test]
fn test_soft_limit_stops_between_pages() {
    let h = TestHarness::new().with_limits(Duration::from_millis(250), Duration::from_secs(30));
    let id = h.add_job("alice", "withholding-certificate", "long.pdf");
    h.replies(&[
        certificate_reply("income", "Payer", 1),
        certificate_reply("income", "Payer", 2),
        certificate_reply("income", "Payer", 3),
    ]);
    let worker = h.worker(
        FakePages::new()
            .texts(&["one", "two", "three"])
            .delay(Duration::from_millis(200)),
    );

    match worker.process_job(id, "").unwrap() {
        ProcessOutcome::Failed { error } => assert!(error.contains("soft time limit")),
        other => panic!("Expected Failed, got {:?}", other),
    }
    assert!(h.model.requests().len() < 3);
    assert_eq!(h.job(id).status, JobStatus::Failed);
}

#[test]
fn test_result_is_discarded_when_job_changes_hands() {
    let h = TestHarness::new();
    let id = h.add_job("alice", "withholding-certificate", "contested.pdf");
    h.replies(&[certificate_reply("income", "Payer", 1000)]);

    let db = h.db.clone();
    let pages = FakePages::new().on_page(move |_| {
        let job = job_repo::find_by_id(&db, id).unwrap().unwrap();
        assert!(job_repo::requeue_if_unchanged(&db, id, &job.updated_at).unwrap());
    });
    let worker = h.worker(pages);

    assert_eq!(worker.process_job(id, "").unwrap(), ProcessOutcome::Discarded);

    let job = h.job(id);
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.result_json.is_none());
}

#[test]
fn test_superseded_claim_does_no_work() {
    let h = TestHarness::new();
    let id = h.add_job("alice", "withholding-certificate", "queued.pdf");
    h.replies(&[certificate_reply("income", "Payer", 1000)]);

    // Claimed, then requeued and claimed again while the first claim waited.
    let queued = job_repo::claim_job(&h.db, id).unwrap().unwrap();
    std::thread::sleep(Duration::from_millis(2));
    assert!(job_repo::requeue_if_unchanged(&h.db, id, &queued.claimed_at).unwrap());
    std::thread::sleep(Duration::from_millis(2));
    let current = job_repo::claim_job(&h.db, id).unwrap().unwrap();

    let worker = h.worker(FakePages::new());
    assert_eq!(worker.run_claimed(queued, "").unwrap(), ProcessOutcome::Discarded);
    assert!(h.model.requests().is_empty());

    let job = h.job(id);
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.updated_at, current.claimed_at);

    assert!(matches!(
        worker.run_claimed(current, "").unwrap(),
        ProcessOutcome::Completed { .. }
    ));
    assert_eq!(h.model.requests().len(), 1);
}

#[test]
fn test_stale_clock_starts_when_work_begins() {
    let h = TestHarness::new();
    let id = h.add_processing_job("alice", "withholding-certificate", 45);
    h.replies(&[certificate_reply("income", "Payer", 1000)]);
    let queued = job_repo::Claim {
        job_id: id,
        claimed_at: h.job(id).updated_at,
    };

    let db = h.db.clone();
    let pages = FakePages::new().on_page(move |_| {
        let cutoff = format_timestamp(chrono::Utc::now() - chrono::Duration::minutes(30));
        assert!(job_repo::find_stale_processing(&db, &cutoff).unwrap().is_empty());
    });
    let worker = h.worker(pages);

    assert!(matches!(
        worker.run_claimed(queued, "").unwrap(),
        ProcessOutcome::Completed { .. }
    ));
    assert_eq!(h.job(id).status, JobStatus::Completed);
}

#[test]
fn test_page_images_are_removed_after_success() {
    let h = TestHarness::new();
    let id = h.add_job("alice", "withholding-certificate", "scan.pdf");
    h.replies(&[
        certificate_reply("expense", "Payer", 10),
        certificate_reply("expense", "Payer", 20),
    ]);
    let pages = Arc::new(
        FakePages::new()
            .texts(&["one", "two"])
            .with_images(&h.scratch_dir),
    );
    let worker = h.worker_with(pages.clone());

    assert!(matches!(
        worker.process_job(id, "").unwrap(),
        ProcessOutcome::Completed { .. }
    ));

    let written = pages.written_images();
    assert_eq!(written.len(), 2);
    assert!(written.iter().all(|p| !p.exists()));
    assert!(h.model.requests().iter().all(|r| r.image_base64.is_some()));
}

#[test]
fn test_page_image_is_removed_after_failure() {
    let h = TestHarness::new().with_extractor(taxocr::llm::ExtractorConfig {
        max_attempts: 1,
        ..Default::default()
    });
    let id = h.add_job("alice", "withholding-certificate", "scan.pdf");
    h.model.push(Err(ExtractionError::EmptyResponse));
    let pages = Arc::new(FakePages::new().with_images(&h.scratch_dir));
    let worker = h.worker_with(pages.clone());

    assert!(matches!(
        worker.process_job(id, "").unwrap(),
        ProcessOutcome::Failed { .. }
    ));
    let written = pages.written_images();
    assert_eq!(written.len(), 1);
    assert!(!written[0].exists());
}
