//! # Delivery Queue
//!
//! In-memory FIFO of outbound webhooks with a bounded capacity, a
//! concurrency/rate governor and a retry scheduler.
//!
//! A single processing task wakes every `poll_interval` and dispatches jobs
//! from the front of the queue while both of these hold:
//!
//! - in-flight deliveries < `max_concurrent`
//! - requests sent in the current window < `rate_limit_per_minute`
//!
//! The window counter resets on a fixed interval (not a sliding window).
//! Counters are updated under the state lock before any delivery is awaited,
//! and the lock is never held across an `.await`.
//!
//! A failed job waits out its backoff delay outside the queue and then goes
//! back to the *front*, ahead of newer jobs. Nothing is persisted; jobs are
//! lost when the process exits.

use crate::errors::{DeliveryError, QueueError};
use crate::events::{DeliveryEvent, DeliveryObserver, JobRef, TracingObserver};
use crate::executor::DeliveryExecutor;
use crate::job::{DeliveryResponse, WebhookJob};
use crate::retry::RetryPolicy;
use cms_bridge_core::{CredentialStore, JobId};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

type Outcome = Result<DeliveryResponse, DeliveryError>;

// ============================================================================
// Settings and Stats
// ============================================================================

/// Capacity and governor limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub max_queue_size: usize,
    pub max_concurrent: usize,
    pub rate_limit_per_minute: u32,
    pub poll_interval: Duration,
    /// Length of the rate-limit window; one minute outside tests
    pub rate_window: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            max_concurrent: 5,
            rate_limit_per_minute: 10,
            poll_interval: Duration::from_millis(100),
            rate_window: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Jobs waiting for dispatch
    pub queued: usize,
    /// Failed jobs waiting out a retry delay
    pub delayed: usize,
    pub in_flight: usize,
    pub sent_this_window: u32,
    pub paused: bool,
}

// ============================================================================
// Delivery Handle
// ============================================================================

/// Resolves when the job reaches a terminal state
#[derive(Debug)]
pub struct DeliveryHandle {
    job_id: JobId,
    receiver: oneshot::Receiver<Outcome>,
}

impl DeliveryHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Wait for the final outcome
    ///
    /// Transient failures are retried inside the queue; only the terminal
    /// result arrives here.
    pub async fn wait(self) -> Result<DeliveryResponse, DeliveryError> {
        self.receiver
            .await
            .unwrap_or(Err(DeliveryError::QueueStopped))
    }
}

// ============================================================================
// Queue State
// ============================================================================

struct QueuedJob {
    job: WebhookJob,
    responder: oneshot::Sender<Outcome>,
    /// Clear generation the job was enqueued in
    epoch: u64,
}

impl QueuedJob {
    fn job_ref(&self) -> JobRef {
        job_ref(&self.job)
    }
}

fn job_ref(job: &WebhookJob) -> JobRef {
    JobRef {
        job_id: job.id(),
        event: job.event().to_string(),
        content_id: job.content_id().clone(),
        target: job.target_url().to_string(),
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedJob>,
    delayed: HashMap<JobId, QueuedJob>,
    in_flight: usize,
    sent_this_window: u32,
    paused: bool,
    stopped: bool,
    epoch: u64,
}

struct Inner {
    settings: QueueSettings,
    policy: RetryPolicy,
    executor: DeliveryExecutor,
    observer: Arc<dyn DeliveryObserver>,
    credentials: Option<Arc<dyn CredentialStore>>,
    state: Mutex<QueueState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        // A panic elsewhere must not wedge the queue
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pull every job the governor allows right now.
    ///
    /// Counters are bumped here, synchronously, before any delivery starts.
    fn take_dispatchable(&self) -> Vec<QueuedJob> {
        let mut state = self.state();
        let mut batch = Vec::new();

        if state.paused {
            return batch;
        }

        while state.in_flight < self.settings.max_concurrent
            && state.sent_this_window < self.settings.rate_limit_per_minute
        {
            let Some(entry) = state.pending.pop_front() else {
                break;
            };
            state.in_flight += 1;
            state.sent_this_window += 1;
            batch.push(entry);
        }

        batch
    }

    fn reset_window(&self) {
        let mut state = self.state();
        if state.sent_this_window > 0 {
            debug!(sent = state.sent_this_window, "Rate window reset");
        }
        state.sent_this_window = 0;
    }

    fn dispatch_ready(self: &Arc<Self>) {
        for entry in self.take_dispatchable() {
            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.attempt(entry).await });
        }
    }

    async fn attempt(self: Arc<Self>, entry: QueuedJob) {
        let attempt = entry.job.attempt_count() + 1;
        self.observer.on_event(&DeliveryEvent::Dispatched {
            job: entry.job_ref(),
            attempt,
        });

        let result = self.executor.execute(&entry.job).await;

        match result {
            Ok(response) => {
                self.release_slot();
                self.observer.on_event(&DeliveryEvent::Succeeded {
                    job: entry.job_ref(),
                    attempt,
                    status: response.status,
                });
                let _ = entry.responder.send(Ok(response));
            }
            Err(error) => {
                if let Some((job_id, delay)) = self.settle_failure(entry, error) {
                    tokio::time::sleep(delay).await;
                    self.requeue(job_id);
                }
            }
        }
    }

    fn release_slot(&self) {
        let mut state = self.state();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Decide between retry and terminal failure for a failed attempt.
    ///
    /// Returns the job id and delay when the job was parked for a retry.
    fn settle_failure(
        &self,
        mut entry: QueuedJob,
        error: DeliveryError,
    ) -> Option<(JobId, Duration)> {
        let attempts = entry.job.record_failure();

        let mut state = self.state();
        state.in_flight = state.in_flight.saturating_sub(1);

        if state.stopped {
            drop(state);
            self.fail(entry, attempts, DeliveryError::QueueStopped);
            return None;
        }

        if entry.epoch != state.epoch {
            // Cleared while in flight: no retry
            drop(state);
            self.fail(entry, attempts, DeliveryError::Cleared);
            return None;
        }

        if error.is_transient() && self.policy.should_retry(attempts) {
            let delay = self.policy.delay_for_attempt(attempts);
            let job_ref = entry.job_ref();
            let job_id = entry.job.id();
            state.delayed.insert(job_id, entry);
            drop(state);

            self.observer.on_event(&DeliveryEvent::Retrying {
                job: job_ref,
                attempt: attempts,
                next_delay: delay,
                error: error.to_string(),
            });
            return Some((job_id, delay));
        }
        drop(state);

        let final_error = if error.is_transient() {
            DeliveryError::Exhausted {
                event: entry.job.event().to_string(),
                content_id: entry.job.content_id().clone(),
                attempts,
                last_error: Box::new(error),
            }
        } else {
            error
        };
        self.fail(entry, attempts, final_error);
        None
    }

    /// Put a delayed job back at the front, unless a clear already took it
    fn requeue(&self, job_id: JobId) {
        let mut state = self.state();
        if let Some(entry) = state.delayed.remove(&job_id) {
            state.pending.push_front(entry);
        }
    }

    fn fail(&self, entry: QueuedJob, attempts: u32, error: DeliveryError) {
        self.observer.on_event(&DeliveryEvent::Failed {
            job: entry.job_ref(),
            attempts,
            error: error.to_string(),
        });
        let _ = entry.responder.send(Err(error));
    }
}

// ============================================================================
// Delivery Queue
// ============================================================================

/// Handle to a running delivery queue
///
/// Clones share the same queue. The processing task stops once every handle
/// is dropped or [`DeliveryQueue::shutdown`] is called.
#[derive(Clone)]
pub struct DeliveryQueue {
    inner: Arc<Inner>,
    stop: Arc<watch::Sender<bool>>,
}

impl DeliveryQueue {
    /// Start a queue with its processing task on the current tokio runtime
    pub fn start(settings: QueueSettings, policy: RetryPolicy, executor: DeliveryExecutor) -> Self {
        Self::builder(settings, policy, executor).start()
    }

    pub fn builder(
        settings: QueueSettings,
        policy: RetryPolicy,
        executor: DeliveryExecutor,
    ) -> DeliveryQueueBuilder {
        DeliveryQueueBuilder {
            settings,
            policy,
            executor,
            observer: Arc::new(TracingObserver),
            credentials: None,
        }
    }

    /// Accept a job, or fail immediately if the queue is at capacity or
    /// shut down
    pub fn enqueue(&self, job: WebhookJob) -> Result<DeliveryHandle, QueueError> {
        let (responder, receiver) = oneshot::channel();
        let job_id = job.id();
        let job_ref = job_ref(&job);

        let queue_length = {
            let mut state = self.inner.state();
            if state.stopped {
                return Err(QueueError::Stopped);
            }
            if state.pending.len() >= self.inner.settings.max_queue_size {
                return Err(QueueError::Full {
                    capacity: self.inner.settings.max_queue_size,
                });
            }
            let epoch = state.epoch;
            state.pending.push_back(QueuedJob {
                job,
                responder,
                epoch,
            });
            state.pending.len()
        };

        self.inner.observer.on_event(&DeliveryEvent::Queued {
            job: job_ref,
            queue_length,
        });

        Ok(DeliveryHandle { job_id, receiver })
    }

    /// Resolve a named target through the credential store, then enqueue
    pub async fn enqueue_for_target(
        &self,
        target_name: &str,
        event: &str,
        content: Value,
    ) -> Result<DeliveryHandle, QueueError> {
        let store = self.inner.credentials.as_ref().ok_or_else(|| {
            QueueError::Credential(cms_bridge_core::CredentialError::Unavailable {
                message: "no credential store configured".to_string(),
            })
        })?;
        let target = store.resolve(target_name).await?;
        let job = WebhookJob::new(target, event, content)?;
        self.enqueue(job)
    }

    /// Reject every waiting job with [`DeliveryError::Cleared`].
    ///
    /// Jobs waiting out a retry delay are rejected too. Deliveries already in
    /// flight are not aborted; they resolve normally on success and are not
    /// retried on failure. Returns the number of rejected jobs.
    pub fn clear(&self) -> usize {
        let drained: Vec<QueuedJob> = {
            let mut state = self.inner.state();
            state.epoch += 1;
            let mut drained: Vec<QueuedJob> = state.pending.drain(..).collect();
            drained.extend(state.delayed.drain().map(|(_, entry)| entry));
            drained
        };

        let rejected = drained.len();
        for entry in drained {
            let _ = entry.responder.send(Err(DeliveryError::Cleared));
        }

        self.inner
            .observer
            .on_event(&DeliveryEvent::QueueCleared { rejected });
        rejected
    }

    /// Stop dispatching; queued jobs stay queued
    pub fn pause(&self) {
        self.inner.state().paused = true;
        info!("Delivery queue paused");
    }

    pub fn resume(&self) {
        self.inner.state().paused = false;
        info!("Delivery queue resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state().paused
    }

    pub fn len(&self) -> usize {
        self.inner.state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state();
        QueueStats {
            queued: state.pending.len(),
            delayed: state.delayed.len(),
            in_flight: state.in_flight,
            sent_this_window: state.sent_this_window,
            paused: state.paused,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.inner.settings
    }

    /// Stop the processing task and reject every waiting job with
    /// [`DeliveryError::QueueStopped`].
    ///
    /// Later enqueues fail with [`QueueError::Stopped`]. In-flight deliveries
    /// finish; a failure among them is not retried. Returns the number of
    /// rejected jobs.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<QueuedJob> = {
            let mut state = self.inner.state();
            if state.stopped {
                return 0;
            }
            state.stopped = true;
            let mut drained: Vec<QueuedJob> = state.pending.drain(..).collect();
            drained.extend(state.delayed.drain().map(|(_, entry)| entry));
            drained
        };

        let _ = self.stop.send(true);

        let rejected = drained.len();
        for entry in drained {
            let _ = entry.responder.send(Err(DeliveryError::QueueStopped));
        }
        if rejected > 0 {
            info!(rejected, "Delivery queue shut down with waiting jobs");
        }
        rejected
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.state().stopped
    }
}

/// Optional collaborators for a [`DeliveryQueue`]
pub struct DeliveryQueueBuilder {
    settings: QueueSettings,
    policy: RetryPolicy,
    executor: DeliveryExecutor,
    observer: Arc<dyn DeliveryObserver>,
    credentials: Option<Arc<dyn CredentialStore>>,
}

impl DeliveryQueueBuilder {
    pub fn observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn start(self) -> DeliveryQueue {
        let (stop, stop_rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            settings: self.settings,
            policy: self.policy,
            executor: self.executor,
            observer: self.observer,
            credentials: self.credentials,
            state: Mutex::new(QueueState::default()),
        });

        spawn_processing_loop(Arc::clone(&inner), stop_rx);

        DeliveryQueue {
            inner,
            stop: Arc::new(stop),
        }
    }
}

fn spawn_processing_loop(inner: Arc<Inner>, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut poll = tokio::time::interval(inner.settings.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let window = inner.settings.rate_window;
        let mut window_reset = tokio::time::interval_at(Instant::now() + window, window);
        window_reset.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let retry_delays_ms: Vec<u128> = inner
            .policy
            .schedule()
            .iter()
            .map(Duration::as_millis)
            .collect();
        debug!(
            max_concurrent = inner.settings.max_concurrent,
            rate_limit = inner.settings.rate_limit_per_minute,
            retry_delays_ms = ?retry_delays_ms,
            "Delivery queue processing started"
        );

        loop {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                _ = window_reset.tick() => inner.reset_window(),
                _ = poll.tick() => inner.dispatch_ready(),
            }
        }

        debug!("Delivery queue processing stopped");
    })
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
