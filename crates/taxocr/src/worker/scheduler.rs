//! Fixed-period background tasks (dispatch tick, janitor sweep).

use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::error::WorkerError;

/// Runs a closure on its own thread every `period` until stopped.
///
/// The first run happens immediately. A run that overruns the period delays
/// the next one instead of bunching ticks up.
pub struct PeriodicTask {
    name: String,
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<F>(name: &str, period: Duration, mut task: F) -> Result<Self, WorkerError>
    where
        F: FnMut() + Send + 'static,
    {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| WorkerError::SpawnFailed(format!("{} runtime: {}", name, e)))?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task_name = name.to_string();

        let handle = std::thread::Builder::new()
            .name(format!("taxocr-{}", name))
            .spawn(move || {
                rt.block_on(async {
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {}
                            changed = shutdown_rx.changed() => {
                                // A dropped sender also means stop.
                                if changed.is_err() || *shutdown_rx.borrow() {
                                    break;
                                }
                                continue;
                            }
                        }

                        if *shutdown_rx.borrow() {
                            break;
                        }
                        task();
                    }
                });
                log::debug!("Periodic task '{}' stopped", task_name);
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        log::info!("Started periodic task '{}' every {:?}", name, period);

        Ok(Self {
            name: name.to_string(),
            shutdown_tx,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signals the task and waits for an in-flight run to finish.
    pub fn stop(mut self) {
        self.signal_and_join();
    }

    fn signal_and_join(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Periodic task '{}' panicked", self.name);
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.signal_and_join();
    }
}
