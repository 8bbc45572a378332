//! Testing utilities for the pipeline.
//!
//! This module provides tools for integration testing:
//! - `MockGeneration` for deterministic rewording without API calls
//! - Scripted pipeline stages (`AppendStage`, `HangingStage`, `FailingStage`)
//! - `CollectingSubscriber` for asserting on event streams
//! - Assertion helpers for verifying run outcomes

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::capability::{CapabilityError, CapabilityResult, TextGeneration};
use crate::error::{PipelineError, PipelineResult};
use crate::events::{EventSubscriber, PipelineEvent};
use crate::segment::Segment;
use crate::stage::{PipelineData, PipelineStage, StageContext};
use crate::telemetry::{ContinuityState, ManifestationScore, ManifestationStore};

/// A mock text generation capability with scripted responses.
///
/// Responses are returned in order; once exhausted, the prompt text is
/// echoed back unchanged.
pub struct MockGeneration {
    responses: Mutex<Vec<String>>,
    next: Mutex<usize>,
    available: bool,
}

impl MockGeneration {
    /// Create an available mock with scripted responses.
    pub fn new(responses: Vec<impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            next: Mutex::new(0),
            available: true,
        }
    }

    /// Create a mock that reports itself unavailable.
    pub fn unavailable() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            next: Mutex::new(0),
            available: false,
        }
    }

    /// Add a response to the queue.
    pub fn queue_response(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push(response.into());
    }
}

#[async_trait]
impl TextGeneration for MockGeneration {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn process_text(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
    ) -> Result<String, CapabilityError> {
        let responses = self.responses.lock().unwrap();
        let mut next = self.next.lock().unwrap();
        if *next < responses.len() {
            let response = responses[*next].clone();
            *next += 1;
            Ok(response)
        } else {
            Ok(prompt.to_string())
        }
    }
}

/// A manifestation store whose every call fails.
pub struct FailingStore;

#[async_trait]
impl ManifestationStore for FailingStore {
    async fn load_state(&self, _project_id: &str) -> CapabilityResult<Option<ContinuityState>> {
        Err(CapabilityError::RequestFailed("store offline".to_string()))
    }

    async fn save_state(&self, _state: &ContinuityState) -> CapabilityResult<()> {
        Err(CapabilityError::RequestFailed("store offline".to_string()))
    }

    async fn save_telemetry(&self, _element: &str, _appeared: bool) -> CapabilityResult<()> {
        Err(CapabilityError::RequestFailed("store offline".to_string()))
    }

    async fn load_manifestation_scores(
        &self,
    ) -> CapabilityResult<HashMap<String, ManifestationScore>> {
        Err(CapabilityError::RequestFailed("store offline".to_string()))
    }

    async fn clear(&self) -> CapabilityResult<()> {
        Err(CapabilityError::RequestFailed("store offline".to_string()))
    }
}

// ============================================================================
// Scripted Stages
// ============================================================================

/// A stage that appends a marker to text input.
///
/// Chaining several of these makes execution order visible in the output.
pub struct AppendStage {
    id: String,
    marker: String,
    enabled: bool,
}

impl AppendStage {
    pub fn new(id: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            marker: marker.into(),
            enabled: true,
        }
    }

    pub fn disabled(id: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::new(id, marker)
        }
    }
}

#[async_trait]
impl PipelineStage for AppendStage {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Append"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, input: &PipelineData) -> Result<(), String> {
        match input {
            PipelineData::Text(_) => Ok(()),
            other => Err(format!("expected text input, got {}", other.kind())),
        }
    }

    async fn execute(
        &self,
        input: PipelineData,
        _ctx: StageContext,
    ) -> PipelineResult<PipelineData> {
        let text = input.as_text().unwrap_or_default();
        Ok(PipelineData::Text(format!("{}.{}", text, self.marker)))
    }
}

/// A stage that sleeps far past any reasonable deadline.
pub struct HangingStage {
    id: String,
}

impl HangingStage {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl PipelineStage for HangingStage {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Hanging"
    }

    fn validate(&self, _input: &PipelineData) -> Result<(), String> {
        Ok(())
    }

    async fn execute(
        &self,
        input: PipelineData,
        _ctx: StageContext,
    ) -> PipelineResult<PipelineData> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(input)
    }
}

/// A stage that always fails with a scripted reason.
pub struct FailingStage {
    id: String,
    reason: String,
}

impl FailingStage {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PipelineStage for FailingStage {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Failing"
    }

    fn validate(&self, _input: &PipelineData) -> Result<(), String> {
        Ok(())
    }

    async fn execute(
        &self,
        _input: PipelineData,
        _ctx: StageContext,
    ) -> PipelineResult<PipelineData> {
        Err(PipelineError::ExecutionFailed {
            stage_id: self.id.clone(),
            reason: self.reason.clone(),
        })
    }
}

// ============================================================================
// Event Subscribers
// ============================================================================

/// Records every event it receives.
#[derive(Default)]
pub struct CollectingSubscriber {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event names in delivery order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(PipelineEvent::name)
            .collect()
    }

    /// A copy of every delivered event.
    pub fn snapshot(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSubscriber for CollectingSubscriber {
    fn handle(&self, event: &PipelineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Panics on every delivery. For exercising subscriber isolation.
pub struct PanickingSubscriber;

impl EventSubscriber for PanickingSubscriber {
    fn handle(&self, _event: &PipelineEvent) {
        panic!("scripted subscriber panic");
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Build `count` plain narration segments with contiguous indices.
pub fn sample_segments(count: usize) -> Vec<Segment> {
    (0..count)
        .map(|i| {
            Segment::new(
                i + 1,
                3.0,
                format!("Plain narration number {} moves the story along.", i + 1),
            )
        })
        .collect()
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert a run finished with no failure.
#[track_caller]
pub fn assert_run_succeeded(run: &crate::orchestrator::PipelineRun) {
    assert!(
        run.failure.is_none(),
        "Expected run to succeed, failed with: {:?}",
        run.failure
    );
}

/// Assert a run failed at the given stage.
#[track_caller]
pub fn assert_run_failed_at(run: &crate::orchestrator::PipelineRun, stage_id: &str) {
    match &run.failure {
        Some(error) => assert_eq!(
            error.stage_id(),
            Some(stage_id),
            "Expected failure at '{stage_id}', got: {error:?}"
        ),
        None => panic!("Expected run to fail at '{stage_id}', but it succeeded"),
    }
}
