//! Pipeline lifecycle events.
//!
//! A closed set of event variants replaces any stringly-typed listener
//! registry: subscribers match on [`PipelineEvent`] and the compiler keeps
//! them honest when the set changes.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

/// Everything observable about a pipeline run, in emission order.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    // Run lifecycle
    PipelineStarted {
        execution_id: Uuid,
        project_id: String,
        total_stages: usize,
    },
    PipelineCompleted {
        execution_id: Uuid,
        elapsed: Duration,
    },
    PipelineFailed {
        execution_id: Uuid,
        failed_stage: String,
        error: String,
    },

    // Stage lifecycle
    StageStarted {
        execution_id: Uuid,
        stage_id: String,
        position: usize,
        total_stages: usize,
    },
    StageCompleted {
        execution_id: Uuid,
        stage_id: String,
        elapsed: Duration,
    },
    StageFailed {
        execution_id: Uuid,
        stage_id: String,
        error: String,
    },
}

impl PipelineEvent {
    /// Snake-case event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PipelineStarted { .. } => "pipeline_started",
            Self::PipelineCompleted { .. } => "pipeline_completed",
            Self::PipelineFailed { .. } => "pipeline_failed",
            Self::StageStarted { .. } => "stage_started",
            Self::StageCompleted { .. } => "stage_completed",
            Self::StageFailed { .. } => "stage_failed",
        }
    }
}

/// Receives pipeline events.
///
/// Handlers run synchronously on the publishing task, in subscription order.
/// Keep them fast; slow handlers stall the pipeline.
pub trait EventSubscriber: Send + Sync {
    fn handle(&self, event: &PipelineEvent);
}

/// Fan-out publisher for pipeline events.
pub struct EventBus {
    subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `event` to every subscriber in subscription order.
    ///
    /// A panicking subscriber never blocks delivery to the rest.
    pub fn publish(&self, event: &PipelineEvent) {
        for subscriber in &self.subscribers {
            let delivery = catch_unwind(AssertUnwindSafe(|| subscriber.handle(event)));
            if delivery.is_err() {
                tracing::warn!(event = event.name(), "Event subscriber panicked");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
