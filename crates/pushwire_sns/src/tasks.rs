//! Background dispatch
//!
//! [`DispatchQueue`] takes `(device id, notification)` jobs off the request path. A fixed pool
//! of workers drains it and runs the [`DispatchHandler`] for every job. Delivery is
//! at-least-once: transient failures are retried, and jobs for the same device may run
//! concurrently and in any order.

use std::sync::Arc;
use std::time::Duration;

use pushwire_config::DispatchConfig;
use pushwire_db::{DeviceRepository, PushMessageRepository};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::DispatchError;
use crate::handler::{DispatchHandler, DispatchOutcome};
use crate::payload::Notification;

/// One queued dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub device_id: i64,
    pub notification: Notification,
}

impl DispatchJob {
    pub fn new(device_id: i64, notification: impl Into<Notification>) -> Self {
        Self {
            device_id,
            notification: notification.into(),
        }
    }
}

/// How often and how patiently a failed job is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; the n-th retry waits n times as long
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Sending side of the dispatch queue. Clones share one queue.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    sender: mpsc::Sender<DispatchJob>,
}

/// Handles of the running workers.
///
/// Workers stop once every [`DispatchQueue`] handle is dropped and the backlog is drained.
pub struct DispatchWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl DispatchQueue {
    /// Starts `worker_count` workers draining a queue of `queue_capacity` jobs.
    pub fn spawn<D, M>(
        handler: Arc<DispatchHandler<D, M>>,
        config: &DispatchConfig,
    ) -> (DispatchQueue, DispatchWorkers)
    where
        D: DeviceRepository + Clone + 'static,
        M: PushMessageRepository + 'static,
    {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let policy = RetryPolicy::from_config(config);

        let handles = (0..config.worker_count.max(1))
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    receiver.clone(),
                    handler.clone(),
                    policy,
                ))
            })
            .collect::<Vec<_>>();

        info!(
            "Started {} dispatch workers (queue capacity {})",
            handles.len(),
            config.queue_capacity
        );
        (DispatchQueue { sender }, DispatchWorkers { handles })
    }

    /// Enqueues a job, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// `DispatchError::QueueClosed` if the workers are gone.
    pub async fn submit(&self, job: DispatchJob) -> Result<(), DispatchError> {
        debug!("Queueing dispatch to device {}", job.device_id);
        self.sender
            .send(job)
            .await
            .map_err(|_| DispatchError::QueueClosed)
    }
}

impl DispatchWorkers {
    /// Drops `queue` and waits until the workers have drained the backlog.
    ///
    /// Other live clones of the queue keep the workers running.
    pub async fn shutdown(self, queue: DispatchQueue) {
        drop(queue);
        self.join().await;
    }

    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!("Dispatch worker panicked: {}", err);
            }
        }
        info!("Dispatch workers stopped");
    }
}

async fn worker_loop<D, M>(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<DispatchJob>>>,
    handler: Arc<DispatchHandler<D, M>>,
    policy: RetryPolicy,
) where
    D: DeviceRepository + Clone,
    M: PushMessageRepository,
{
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };
        // Failures are logged inside; the queue has no one to report to.
        let _ = run_job(&handler, &job, &policy).await;
    }
    debug!("Dispatch worker {} stopped", worker);
}

/// Runs one job, retrying transient failures according to `policy`.
pub async fn run_job<D, M>(
    handler: &DispatchHandler<D, M>,
    job: &DispatchJob,
    policy: &RetryPolicy,
) -> Result<DispatchOutcome, DispatchError>
where
    D: DeviceRepository + Clone,
    M: PushMessageRepository,
{
    let mut attempt: u32 = 1;
    loop {
        match handler.dispatch(job.device_id, &job.notification).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff * attempt;
                warn!(
                    "Dispatch to device {} failed (attempt {}/{}), retrying in {:?}: {}",
                    job.device_id, attempt, policy.max_attempts, delay, err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                error!(
                    "Dispatch to device {} failed after {} attempt(s): {}",
                    job.device_id, attempt, err
                );
                return Err(err);
            }
        }
    }
}
