use std::sync::Arc;
use std::time::Duration;

use lifecycle_storage::OperationStore;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::Executor;

/// A pool of workers draining operation ids into an [`Executor`].
///
/// A positive delay from the executor re-enqueues the id once the delay has
/// passed; the worker is free in the meantime. Two workers may pick up the
/// same id (e.g. it was added twice); the store's version check keeps that
/// safe.
pub struct Queue {
    sender: mpsc::UnboundedSender<String>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Queue {
    /// Spawn the configured number of worker tasks
    /// ([`ManagerConfig::workers`](crate::ManagerConfig::workers)) on the
    /// current tokio runtime.
    pub fn start<S: OperationStore>(executor: Arc<Executor<S>>) -> Self {
        let workers = executor.manager().config().workers;
        let (sender, receiver) = mpsc::unbounded_channel::<String>();
        let receiver = Arc::new(Mutex::new(receiver));
        let (shutdown, _) = watch::channel(false);

        let workers = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&executor),
                    Arc::clone(&receiver),
                    sender.clone(),
                    shutdown.subscribe(),
                ))
            })
            .collect();

        Self {
            sender,
            shutdown,
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue an operation for immediate execution.
    pub fn add(&self, operation_id: impl Into<String>) {
        let operation_id = operation_id.into();
        if self.sender.send(operation_id.clone()).is_err() {
            warn!(operation_id = %operation_id, "queue is shut down, dropping operation");
        }
    }

    /// Enqueue an operation once `delay` has passed.
    pub fn add_after(&self, operation_id: impl Into<String>, delay: Duration) {
        schedule(
            self.sender.clone(),
            self.shutdown.subscribe(),
            operation_id.into(),
            delay,
        );
    }

    /// Stop all workers and pending re-enqueues, waiting for in-flight
    /// iterations to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn run_worker<S: OperationStore>(
    worker: usize,
    executor: Arc<Executor<S>>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    sender: mpsc::UnboundedSender<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                _ = shutdown.changed() => None,
                id = receiver.recv() => id,
            }
        };
        let Some(operation_id) = next else {
            debug!(worker, "worker stopping");
            return;
        };

        match executor.execute(&operation_id).await {
            Ok(delay) if delay.is_zero() => {
                info!(worker, operation_id = %operation_id, "operation processing finished");
            }
            Ok(delay) => {
                debug!(
                    worker,
                    operation_id = %operation_id,
                    delay_secs = delay.as_secs(),
                    "operation rescheduled"
                );
                schedule(sender.clone(), shutdown.clone(), operation_id, delay);
            }
            Err(e) if e.is_failed_outcome() => {
                info!(worker, operation_id = %operation_id, "operation finished as failed: {e}");
            }
            Err(e) => {
                error!(worker, operation_id = %operation_id, "operation processing error: {e}");
            }
        }
    }
}

fn schedule(
    sender: mpsc::UnboundedSender<String>,
    mut shutdown: watch::Receiver<bool>,
    operation_id: String,
    delay: Duration,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.changed() => {}
            _ = tokio::time::sleep(delay) => {
                let _ = sender.send(operation_id);
            }
        }
    });
}
