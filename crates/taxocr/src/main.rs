use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use taxocr::config::{load_config, Config};
use taxocr::db::{default_database_path, Database};
use taxocr::llm::{AzureChatModel, GenerativeExtractor};
use taxocr::pipeline::{ExtractionWorker, PipelineConfig, ProcessOutcome};
use taxocr::processor::{OcrPageExtractor, TesseractEngine};
use taxocr::worker::{
    DbCaseDirectory, DispatchPolicy, Dispatcher, Janitor, JobReport, PeriodicTask, WorkerPool,
};
use taxocr::{logging, secrets, ProcessError, TaxOcrError};

const DEFAULT_CONFIG_FILE: &str = "taxocr.json";

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", config_path.display(), e);
            std::process::exit(2);
        }
    };

    logging::init(&config.logging);
    info!("Starting taxocr-daemon v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), TaxOcrError> {
    let db_path = match &config.database_path {
        Some(path) => secrets::expand_home(path),
        None => default_database_path().ok_or_else(|| {
            taxocr::ConfigError::Validation {
                message: "No database_path configured and no home directory found".to_string(),
            }
        })?,
    };
    let db = Database::open(&db_path)?;
    info!("Job store: {}", db_path.display());

    let api_key = secrets::resolve_api_key(&config.model)?;
    let model = Arc::new(AzureChatModel::new(&config.model, api_key)?);

    let pipeline_config = Arc::new(PipelineConfig::from_config(config));
    let extractor = Arc::new(GenerativeExtractor::new(
        model,
        pipeline_config.extractor.clone(),
    ));

    let scratch_dir = config
        .ocr
        .scratch_dir
        .as_deref()
        .map(secrets::expand_home)
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&scratch_dir).map_err(|e| ProcessError::ScratchDir {
        path: scratch_dir.clone(),
        source: e,
    })?;
    let ocr = Arc::new(TesseractEngine::new(&config.ocr.languages));
    info!("OCR languages: {}", ocr.languages());
    let pages = Arc::new(OcrPageExtractor::new(ocr, config.ocr.dpi, scratch_dir));

    let worker = ExtractionWorker::new(db.clone(), pages, extractor, pipeline_config.clone());
    let pool = Arc::new(WorkerPool::new(worker, config.worker_count)?);

    let dispatcher = Dispatcher::new(
        db.clone(),
        pool.clone(),
        Arc::new(DbCaseDirectory::new(db.clone())),
        DispatchPolicy::from_config(&config.dispatcher),
    );
    let dispatch_task = PeriodicTask::spawn(
        "dispatcher",
        Duration::from_secs(config.dispatcher.interval_secs),
        move || {
            if let Err(e) = dispatcher.dispatch() {
                error!("Dispatch cycle failed: {}", e);
            }
        },
    )?;

    let janitor = Janitor::new(
        db,
        pipeline_config.upload_base.clone(),
        chrono::Duration::days(config.retention.failed_retention_days),
    );
    let janitor_task = PeriodicTask::spawn(
        "janitor",
        Duration::from_secs(config.retention.janitor_interval_hours * 3600),
        move || {
            if let Err(e) = janitor.sweep() {
                error!("Janitor sweep failed: {}", e);
            }
        },
    )?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
        warn!("Failed to install signal handler: {}", e);
    }

    while running.load(Ordering::SeqCst) {
        if let Some(report) = pool.recv_report_timeout(Duration::from_millis(500)) {
            log_report(&report);
        }
    }

    info!("Shutdown requested");
    janitor_task.stop();
    dispatch_task.stop();

    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.wait(),
        Err(pool) => {
            warn!("Worker pool still shared at shutdown; not waiting for running jobs");
            pool.shutdown();
        }
    }

    info!("taxocr-daemon stopped");
    Ok(())
}

fn log_report(report: &JobReport) {
    match &report.outcome {
        Ok(ProcessOutcome::Completed { warnings }) if warnings.is_empty() => {
            info!("Job {} completed", report.job_id);
        }
        Ok(ProcessOutcome::Completed { warnings }) => {
            info!(
                "Job {} completed with control warnings: {}",
                report.job_id,
                warnings.join(", ")
            );
        }
        Ok(ProcessOutcome::Failed { error }) => {
            warn!("Job {} failed: {}", report.job_id, error);
        }
        Ok(other) => info!("Job {}: {:?}", report.job_id, other),
        Err(e) => error!("Job {} could not be recorded: {}", report.job_id, e),
    }
}
