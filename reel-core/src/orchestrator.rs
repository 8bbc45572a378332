//! Stage registry and pipeline execution.
//!
//! The orchestrator owns no domain logic. It resolves stages by id, enforces
//! per-stage deadlines, publishes lifecycle events, and exposes progress
//! through a watch channel. Each run gets a fresh execution id; nothing is
//! shared between runs except the registered stages themselves.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::events::{EventBus, EventSubscriber, PipelineEvent};
use crate::stage::{PipelineData, PipelineStage, StageContext};

/// Default deadline for text-class stages.
pub const TEXT_STAGE_DEADLINE: Duration = Duration::from_secs(15);

/// Deadline for stages that wait on media rendering backends.
pub const MEDIA_STAGE_DEADLINE: Duration = Duration::from_secs(60);

// ============================================================================
// Progress
// ============================================================================

/// Observable progress of the current run.
///
/// `completed` counts stages finished so far; on failure it stops at the
/// failed stage's position and `current_stage` clears.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineProgress {
    pub completed: usize,
    pub total: usize,
    pub current_stage: Option<String>,
}

impl PipelineProgress {
    /// Fraction complete in [0, 1]. Zero when no stages are planned.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

// ============================================================================
// Run Outcome
// ============================================================================

/// Outcome of one pipeline run.
///
/// `outputs` holds every stage that completed, keyed by stage id, whether or
/// not the run as a whole succeeded.
#[derive(Debug)]
pub struct PipelineRun {
    pub execution_id: Uuid,
    pub outputs: HashMap<String, PipelineData>,
    /// The first failure, if any. Stages after it never ran.
    pub failure: Option<PipelineError>,
}

impl PipelineRun {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Output of a completed stage, if it ran.
    pub fn output(&self, stage_id: &str) -> Option<&PipelineData> {
        self.outputs.get(stage_id)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Registers stages and runs them.
pub struct Orchestrator {
    stages: HashMap<String, Arc<dyn PipelineStage>>,
    events: EventBus,
    progress_tx: watch::Sender<PipelineProgress>,
    progress_rx: watch::Receiver<PipelineProgress>,
    default_deadline: Duration,
}

impl Orchestrator {
    pub fn new() -> Self {
        let (progress_tx, progress_rx) = watch::channel(PipelineProgress::default());
        Self {
            stages: HashMap::new(),
            events: EventBus::new(),
            progress_tx,
            progress_rx,
            default_deadline: TEXT_STAGE_DEADLINE,
        }
    }

    /// Override the deadline `run_pipeline` applies to every stage.
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = deadline;
        self
    }

    /// Register a stage under its id. Re-registering an id replaces the
    /// previous stage.
    pub fn register(&mut self, stage: Arc<dyn PipelineStage>) {
        let id = stage.id().to_string();
        if self.stages.insert(id.clone(), stage).is_some() {
            tracing::debug!(stage_id = %id, "Replaced registered stage");
        }
    }

    /// Look up a registered stage.
    pub fn stage(&self, stage_id: &str) -> Option<Arc<dyn PipelineStage>> {
        self.stages.get(stage_id).cloned()
    }

    /// Ids of every registered stage, in no particular order.
    pub fn stage_ids(&self) -> Vec<&str> {
        self.stages.keys().map(String::as_str).collect()
    }

    /// Attach an event subscriber. Subscribers see events in subscription
    /// order.
    pub fn subscribe(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        self.events.subscribe(subscriber);
    }

    /// A receiver that observes progress across runs.
    pub fn watch_progress(&self) -> watch::Receiver<PipelineProgress> {
        self.progress_rx.clone()
    }

    /// Run a single stage under a deadline with a fresh default context.
    pub async fn execute_stage(
        &self,
        stage: Arc<dyn PipelineStage>,
        input: PipelineData,
        deadline: Duration,
    ) -> PipelineResult<PipelineData> {
        self.execute_with_context(stage, input, deadline, StageContext::default())
            .await
    }

    /// Run a single stage under a deadline.
    ///
    /// The stage work and an independent timer race; whichever finishes first
    /// decides the outcome and the loser is aborted. A stage that hangs
    /// therefore cannot hold the pipeline past its deadline.
    pub async fn execute_with_context(
        &self,
        stage: Arc<dyn PipelineStage>,
        input: PipelineData,
        deadline: Duration,
        ctx: StageContext,
    ) -> PipelineResult<PipelineData> {
        let stage_id = stage.id().to_string();

        if !stage.is_enabled() {
            return Err(PipelineError::InvalidInput {
                stage_id,
                predicate: "stage is disabled".to_string(),
            });
        }
        if let Err(predicate) = stage.validate(&input) {
            return Err(PipelineError::InvalidInput {
                stage_id,
                predicate,
            });
        }

        tracing::debug!(
            stage_id = %stage_id,
            deadline_ms = deadline.as_millis() as u64,
            "Executing stage"
        );

        let started = Instant::now();
        let task_stage = Arc::clone(&stage);
        let handle = tokio::spawn(async move { task_stage.execute(input, ctx).await });
        let abort = handle.abort_handle();

        match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(PipelineError::ExecutionFailed {
                stage_id,
                reason: join_error.to_string(),
            }),
            Err(_) => {
                // Late results from the aborted task have no further effects.
                abort.abort();
                let elapsed = started.elapsed();
                tracing::warn!(
                    stage_id = %stage_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Stage deadline exceeded"
                );
                Err(PipelineError::Timeout { stage_id, elapsed })
            }
        }
    }

    /// Run stages in `order`, feeding each stage the previous stage's output.
    ///
    /// The first stage receives `raw_text`. The run aborts on the first
    /// failure; outputs collected up to that point are returned alongside the
    /// failure.
    pub async fn run_pipeline(
        &self,
        order: &[&str],
        raw_text: impl Into<String>,
        project_id: impl Into<String>,
    ) -> PipelineRun {
        let ctx = StageContext::new(project_id);
        let execution_id = ctx.execution_id;
        let total = order.len();
        let run_started = Instant::now();
        let mut outputs: HashMap<String, PipelineData> = HashMap::new();

        tracing::info!(
            execution_id = %execution_id,
            project_id = %ctx.project_id,
            stages = total,
            "Pipeline run started"
        );
        self.events.publish(&PipelineEvent::PipelineStarted {
            execution_id,
            project_id: ctx.project_id.clone(),
            total_stages: total,
        });

        let mut data = PipelineData::Text(raw_text.into());

        for (position, stage_id) in order.iter().copied().enumerate() {
            self.progress_tx.send_replace(PipelineProgress {
                completed: position,
                total,
                current_stage: Some(stage_id.to_string()),
            });

            let Some(stage) = self.stage(stage_id) else {
                let error = PipelineError::StageNotFound {
                    stage_id: stage_id.to_string(),
                };
                return self.fail_run(execution_id, position, total, outputs, stage_id, error);
            };

            self.events.publish(&PipelineEvent::StageStarted {
                execution_id,
                stage_id: stage_id.to_string(),
                position,
                total_stages: total,
            });

            let stage_started = Instant::now();
            let attempt = self
                .execute_with_context(stage, data.clone(), self.default_deadline, ctx.clone())
                .await;

            match attempt {
                Ok(output) => {
                    self.events.publish(&PipelineEvent::StageCompleted {
                        execution_id,
                        stage_id: stage_id.to_string(),
                        elapsed: stage_started.elapsed(),
                    });
                    outputs.insert(stage_id.to_string(), output.clone());
                    data = output;
                }
                Err(error) => {
                    return self.fail_run(execution_id, position, total, outputs, stage_id, error);
                }
            }
        }

        self.progress_tx.send_replace(PipelineProgress {
            completed: total,
            total,
            current_stage: None,
        });
        let elapsed = run_started.elapsed();
        self.events.publish(&PipelineEvent::PipelineCompleted {
            execution_id,
            elapsed,
        });
        tracing::info!(
            execution_id = %execution_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline run complete"
        );

        PipelineRun {
            execution_id,
            outputs,
            failure: None,
        }
    }

    fn fail_run(
        &self,
        execution_id: Uuid,
        position: usize,
        total: usize,
        outputs: HashMap<String, PipelineData>,
        stage_id: &str,
        error: PipelineError,
    ) -> PipelineRun {
        self.progress_tx.send_replace(PipelineProgress {
            completed: position,
            total,
            current_stage: None,
        });
        self.events.publish(&PipelineEvent::StageFailed {
            execution_id,
            stage_id: stage_id.to_string(),
            error: error.to_string(),
        });
        self.events.publish(&PipelineEvent::PipelineFailed {
            execution_id,
            failed_stage: stage_id.to_string(),
            error: error.to_string(),
        });
        tracing::error!(
            execution_id = %execution_id,
            stage_id = %stage_id,
            error = %error,
            "Pipeline run failed"
        );

        PipelineRun {
            execution_id,
            outputs,
            failure: Some(error),
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_run_failed_at, assert_run_succeeded, AppendStage, CollectingSubscriber,
        FailingStage, HangingStage,
    };

    fn text(value: &str) -> PipelineData {
        PipelineData::Text(value.to_string())
    }

    #[tokio::test]
    async fn test_execute_stage_happy_path() {
        let orch = Orchestrator::new();
        let out = orch
            .execute_stage(
                Arc::new(AppendStage::new("append", "a")),
                text("start"),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(out.as_text(), Some("start.a"));
    }

    #[tokio::test]
    async fn test_execute_stage_rejects_disabled() {
        let orch = Orchestrator::new();
        let err = orch
            .execute_stage(
                Arc::new(AppendStage::disabled("append", "a")),
                text("start"),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        match err {
            PipelineError::InvalidInput { stage_id, predicate } => {
                assert_eq!(stage_id, "append");
                assert_eq!(predicate, "stage is disabled");
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_stage_rejects_wrong_variant() {
        let orch = Orchestrator::new();
        let report = crate::continuity::ContinuityReport {
            segments: Vec::new(),
            anchors: Vec::new(),
            issues: Vec::new(),
            overall_confidence: 1.0,
            requires_human_review: false,
        };
        let err = orch
            .execute_stage(
                Arc::new(AppendStage::new("append", "a")),
                PipelineData::Continuity(report),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        match err {
            PipelineError::InvalidInput { predicate, .. } => {
                assert!(predicate.contains("expected text input"));
                assert!(predicate.contains("continuity"));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_stage_deadline_cuts_off_hung_stage() {
        let orch = Orchestrator::new();
        let started = Instant::now();
        let err = orch
            .execute_stage(
                Arc::new(HangingStage::new("hang")),
                text("start"),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        let waited = started.elapsed();

        match err {
            PipelineError::Timeout { stage_id, elapsed } => {
                assert_eq!(stage_id, "hang");
                assert!(elapsed >= Duration::from_millis(50));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
        // The caller gets control back promptly, not after the stage's own
        // hour-long sleep.
        assert!(waited < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_run_pipeline_chains_outputs_in_order() {
        let mut orch = Orchestrator::new();
        orch.register(Arc::new(AppendStage::new("first", "a")));
        orch.register(Arc::new(AppendStage::new("second", "b")));

        let run = orch.run_pipeline(&["first", "second"], "start", "default").await;

        assert_run_succeeded(&run);
        assert_eq!(run.output("first").unwrap().as_text(), Some("start.a"));
        assert_eq!(run.output("second").unwrap().as_text(), Some("start.a.b"));
    }

    #[tokio::test]
    async fn test_run_pipeline_unknown_stage() {
        let orch = Orchestrator::new();
        let run = orch.run_pipeline(&["missing"], "start", "default").await;

        assert_run_failed_at(&run, "missing");
        assert!(matches!(
            run.failure,
            Some(PipelineError::StageNotFound { .. })
        ));
        assert!(run.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_run_pipeline_keeps_partials_on_failure() {
        let mut orch = Orchestrator::new();
        orch.register(Arc::new(AppendStage::new("first", "a")));
        orch.register(Arc::new(FailingStage::new("broken", "scripted failure")));
        orch.register(Arc::new(AppendStage::new("last", "z")));

        let run = orch
            .run_pipeline(&["first", "broken", "last"], "start", "default")
            .await;

        assert_run_failed_at(&run, "broken");
        assert_eq!(run.output("first").unwrap().as_text(), Some("start.a"));
        assert!(run.output("broken").is_none());
        assert!(run.output("last").is_none());
    }

    #[tokio::test]
    async fn test_run_pipeline_event_sequence() {
        let subscriber = Arc::new(CollectingSubscriber::new());
        let mut orch = Orchestrator::new();
        orch.register(Arc::new(AppendStage::new("first", "a")));
        orch.register(Arc::new(AppendStage::new("second", "b")));
        orch.subscribe(subscriber.clone());

        let run = orch.run_pipeline(&["first", "second"], "start", "default").await;
        assert_run_succeeded(&run);

        assert_eq!(
            subscriber.names(),
            vec![
                "pipeline_started",
                "stage_started",
                "stage_completed",
                "stage_started",
                "stage_completed",
                "pipeline_completed",
            ]
        );
    }

    #[tokio::test]
    async fn test_run_pipeline_failure_event_sequence() {
        let subscriber = Arc::new(CollectingSubscriber::new());
        let mut orch = Orchestrator::new();
        orch.register(Arc::new(FailingStage::new("broken", "scripted failure")));
        orch.subscribe(subscriber.clone());

        orch.run_pipeline(&["broken"], "start", "default").await;

        assert_eq!(
            subscriber.names(),
            vec![
                "pipeline_started",
                "stage_started",
                "stage_failed",
                "pipeline_failed",
            ]
        );
    }

    #[tokio::test]
    async fn test_progress_reaches_completion() {
        let mut orch = Orchestrator::new();
        orch.register(Arc::new(AppendStage::new("first", "a")));
        orch.register(Arc::new(AppendStage::new("second", "b")));
        let progress = orch.watch_progress();

        orch.run_pipeline(&["first", "second"], "start", "default").await;

        let latest = progress.borrow().clone();
        assert_eq!(latest.completed, 2);
        assert_eq!(latest.total, 2);
        assert_eq!(latest.current_stage, None);
        assert!((latest.percent() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_progress_stops_at_failed_stage() {
        let mut orch = Orchestrator::new();
        orch.register(Arc::new(AppendStage::new("first", "a")));
        orch.register(Arc::new(FailingStage::new("broken", "scripted failure")));
        let progress = orch.watch_progress();

        orch.run_pipeline(&["first", "broken"], "start", "default").await;

        let latest = progress.borrow().clone();
        assert_eq!(latest.completed, 1);
        assert_eq!(latest.total, 2);
        assert_eq!(latest.current_stage, None);
    }

    #[tokio::test]
    async fn test_register_replaces_previous_stage() {
        let mut orch = Orchestrator::new();
        orch.register(Arc::new(AppendStage::new("only", "old")));
        orch.register(Arc::new(AppendStage::new("only", "new")));

        let run = orch.run_pipeline(&["only"], "start", "default").await;
        assert_eq!(run.output("only").unwrap().as_text(), Some("start.new"));
    }

    #[tokio::test]
    async fn test_concurrent_stage_executions_stay_isolated() {
        let orch = Orchestrator::new();
        let stage: Arc<dyn PipelineStage> = Arc::new(AppendStage::new("append", "m"));

        let (left, right) = tokio::join!(
            orch.execute_stage(Arc::clone(&stage), text("left"), Duration::from_secs(1)),
            orch.execute_stage(Arc::clone(&stage), text("right"), Duration::from_secs(1)),
        );

        assert_eq!(left.unwrap().as_text(), Some("left.m"));
        assert_eq!(right.unwrap().as_text(), Some("right.m"));
    }

    #[tokio::test]
    async fn test_empty_order_completes_trivially() {
        let orch = Orchestrator::new();
        let run = orch.run_pipeline(&[], "start", "default").await;
        assert_run_succeeded(&run);
        assert!(run.outputs.is_empty());
    }

    #[test]
    fn test_percent_zero_when_no_stages() {
        assert_eq!(PipelineProgress::default().percent(), 0.0);
    }
}
