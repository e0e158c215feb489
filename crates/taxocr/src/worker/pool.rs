use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::db::job_repo::Claim;
use crate::error::WorkerError;
use crate::pipeline::{ExtractionWorker, ProcessOutcome};

/// A claimed job on its way to a worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedJob {
    pub claim: Claim,
    pub company_name: String,
}

/// The outcome of one dispatched job, for the host to log.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: i64,
    pub outcome: Result<ProcessOutcome, String>,
}

/// Accepts claimed jobs without waiting for them to run.
pub trait JobSubmitter: Send + Sync {
    fn submit(&self, job: DispatchedJob) -> Result<(), WorkerError>;
}

pub struct WorkerPool {
    job_sender: Sender<DispatchedJob>,
    job_receiver: Receiver<DispatchedJob>,
    report_receiver: Receiver<JobReport>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    extraction: ExtractionWorker,
}

impl WorkerPool {
    pub fn new(extraction: ExtractionWorker, worker_count: usize) -> Result<Self, WorkerError> {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = unbounded::<DispatchedJob>();
        let (report_sender, report_receiver) = unbounded::<JobReport>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let report_tx = report_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker = extraction.clone();

            let handle = thread::Builder::new()
                .name(format!("taxocr-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, job_rx, report_tx, shutdown_flag, worker))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            job_receiver,
            report_receiver,
            workers,
            shutdown,
            extraction,
        })
    }

    pub fn try_recv_report(&self) -> Option<JobReport> {
        self.report_receiver.try_recv().ok()
    }

    pub fn recv_report(&self) -> Option<JobReport> {
        self.report_receiver.recv().ok()
    }

    pub fn recv_report_timeout(&self, timeout: std::time::Duration) -> Option<JobReport> {
        self.report_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Stops accepting work, waits for running jobs and hands every queued
    /// but unstarted claim back to PENDING.
    pub fn wait(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        let mut released = 0;
        for job in self.job_receiver.try_iter() {
            match self.extraction.release(&job.claim) {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to release job {}: {}", job.claim.job_id, e),
            }
        }
        if released > 0 {
            info!("Returned {} queued jobs to PENDING", released);
        }

        info!("All workers have stopped");
    }
}

impl JobSubmitter for WorkerPool {
    fn submit(&self, job: DispatchedJob) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<DispatchedJob>,
    report_sender: Sender<JobReport>,
    shutdown: Arc<AtomicBool>,
    extraction: ExtractionWorker,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(job) => {
                let job_id = job.claim.job_id;
                debug!("Worker {} processing job {}", worker_id, job_id);

                let outcome = extraction
                    .run_claimed(job.claim, &job.company_name)
                    .map_err(|e| e.to_string());
                if let Err(e) = &outcome {
                    error!("Worker {} could not record job {}: {}", worker_id, job_id, e);
                }

                // Nobody listening for reports is fine.
                let _ = report_sender.send(JobReport { job_id, outcome });
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
