//! # Delivery Lifecycle Events
//!
//! The queue reports every state change of a job as a [`DeliveryEvent`] to a
//! [`DeliveryObserver`]. Observers are called synchronously from the queue and
//! must not block.

use cms_bridge_core::{ContentId, JobId};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Identity of the job an event is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRef {
    pub job_id: JobId,
    pub event: String,
    pub content_id: ContentId,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryEvent {
    /// Accepted into the queue
    Queued { job: JobRef, queue_length: usize },

    /// Handed to the executor
    Dispatched { job: JobRef, attempt: u32 },

    Succeeded {
        job: JobRef,
        attempt: u32,
        status: u16,
    },

    /// Failed, waiting `next_delay` before going back to the front of the queue
    Retrying {
        job: JobRef,
        attempt: u32,
        #[serde(with = "duration_millis")]
        next_delay: Duration,
        error: String,
    },

    /// Terminal failure
    Failed {
        job: JobRef,
        attempts: u32,
        error: String,
    },

    /// `clear()` rejected this many waiting jobs
    QueueCleared { rejected: usize },
}

impl DeliveryEvent {
    pub fn job(&self) -> Option<&JobRef> {
        match self {
            Self::Queued { job, .. }
            | Self::Dispatched { job, .. }
            | Self::Succeeded { job, .. }
            | Self::Retrying { job, .. }
            | Self::Failed { job, .. } => Some(job),
            Self::QueueCleared { .. } => None,
        }
    }

    /// Short name used for logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Queued { .. } => "queued",
            Self::Dispatched { .. } => "dispatched",
            Self::Succeeded { .. } => "success",
            Self::Retrying { .. } => "retry",
            Self::Failed { .. } => "failed",
            Self::QueueCleared { .. } => "queue_cleared",
        }
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

// ============================================================================
// Observers
// ============================================================================

/// Receives delivery lifecycle events
pub trait DeliveryObserver: Send + Sync {
    fn on_event(&self, event: &DeliveryEvent);
}

/// Writes every event as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DeliveryObserver for TracingObserver {
    fn on_event(&self, event: &DeliveryEvent) {
        match event {
            DeliveryEvent::Queued { job, queue_length } => debug!(
                job_id = %job.job_id,
                event = %job.event,
                content_id = %job.content_id,
                queue_length,
                "Webhook queued"
            ),
            DeliveryEvent::Dispatched { job, attempt } => debug!(
                job_id = %job.job_id,
                event = %job.event,
                attempt,
                "Webhook dispatched"
            ),
            DeliveryEvent::Succeeded {
                job,
                attempt,
                status,
            } => info!(
                job_id = %job.job_id,
                event = %job.event,
                content_id = %job.content_id,
                target = %job.target,
                attempt,
                status,
                "Webhook delivered"
            ),
            DeliveryEvent::Retrying {
                job,
                attempt,
                next_delay,
                error,
            } => warn!(
                job_id = %job.job_id,
                event = %job.event,
                content_id = %job.content_id,
                target = %job.target,
                attempt,
                delay_ms = next_delay.as_millis() as u64,
                error = %error,
                "Webhook delivery failed, retrying"
            ),
            DeliveryEvent::Failed {
                job,
                attempts,
                error,
            } => warn!(
                job_id = %job.job_id,
                event = %job.event,
                content_id = %job.content_id,
                target = %job.target,
                attempts,
                error = %error,
                "Webhook delivery failed permanently"
            ),
            DeliveryEvent::QueueCleared { rejected } => {
                info!(rejected, "Delivery queue cleared")
            }
        }
    }
}

/// Forwards events into a tokio channel
///
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<DeliveryEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeliveryEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl DeliveryObserver for ChannelObserver {
    fn on_event(&self, event: &DeliveryEvent) {
        let _ = self.sender.send(event.clone());
    }
}

/// Fans each event out to several observers, in registration order
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn DeliveryObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl DeliveryObserver for ObserverSet {
    fn on_event(&self, event: &DeliveryEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
