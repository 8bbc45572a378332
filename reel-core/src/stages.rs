//! Built-in pipeline stages.
//!
//! Thin adapters that wire the engines into the stage contract. The engines
//! stay directly callable; these wrappers add input validation, stable ids,
//! and mapping of engine errors into the pipeline error taxonomy.

use async_trait::async_trait;

use crate::analysis::AnalysisEngine;
use crate::continuity::{ContinuityEngine, ContinuityError};
use crate::error::{PipelineError, PipelineResult};
use crate::rewording::{RewordingEngine, RewordingError, RewordingStyle, MAX_REWORD_CHARS};
use crate::segmentation::{SegmentationEngine, DEFAULT_MAX_DURATION};
use crate::stage::{PipelineData, PipelineStage, StageContext};
use crate::taxonomy::TaxonomyEngine;

pub const SEGMENTATION_STAGE_ID: &str = "segmentation";
pub const TAXONOMY_STAGE_ID: &str = "taxonomy";
pub const CONTINUITY_STAGE_ID: &str = "continuity";
pub const ANALYSIS_STAGE_ID: &str = "analysis";
pub const REWORDING_STAGE_ID: &str = "rewording";

/// Stage ids of the core prose-to-segments chain, in execution order.
pub const DEFAULT_PIPELINE_ORDER: [&str; 3] =
    [SEGMENTATION_STAGE_ID, TAXONOMY_STAGE_ID, CONTINUITY_STAGE_ID];

/// Stories past this size are rejected before analysis runs.
pub const MAX_ANALYSIS_CHARS: usize = 200_000;

// ============================================================================
// Segmentation
// ============================================================================

/// Splits raw prose into timed segments.
pub struct SegmentationStage {
    engine: SegmentationEngine,
    max_duration: f64,
    enabled: bool,
}

impl SegmentationStage {
    pub fn new() -> Self {
        Self::with_max_duration(DEFAULT_MAX_DURATION)
    }

    /// Use a custom per-segment duration ceiling, in seconds.
    pub fn with_max_duration(max_duration: f64) -> Self {
        Self {
            engine: SegmentationEngine::new(),
            max_duration,
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Default for SegmentationStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStage for SegmentationStage {
    fn id(&self) -> &str {
        SEGMENTATION_STAGE_ID
    }

    fn name(&self) -> &str {
        "Story Segmentation"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, input: &PipelineData) -> Result<(), String> {
        match input.prose() {
            Some(text) if text.trim().is_empty() => Err("input text is empty".to_string()),
            Some(_) => Ok(()),
            None => Err(format!(
                "expected text or reworded input, got {}",
                input.kind()
            )),
        }
    }

    async fn execute(
        &self,
        input: PipelineData,
        _ctx: StageContext,
    ) -> PipelineResult<PipelineData> {
        let kind = input.kind();
        let Some(text) = input.into_prose() else {
            return Err(PipelineError::InvalidInput {
                stage_id: SEGMENTATION_STAGE_ID.to_string(),
                predicate: format!("expected text or reworded input, got {kind}"),
            });
        };

        let output = self
            .engine
            .segment_text(&text, self.max_duration)
            .map_err(|error| PipelineError::ExecutionFailed {
                stage_id: SEGMENTATION_STAGE_ID.to_string(),
                reason: error.to_string(),
            })?;
        Ok(PipelineData::Segments(output))
    }
}

// ============================================================================
// Taxonomy
// ============================================================================

/// Assigns a cinematic treatment to every segment.
pub struct TaxonomyStage {
    engine: TaxonomyEngine,
    enabled: bool,
}

impl TaxonomyStage {
    pub fn new() -> Self {
        Self {
            engine: TaxonomyEngine::new(),
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Default for TaxonomyStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStage for TaxonomyStage {
    fn id(&self) -> &str {
        TAXONOMY_STAGE_ID
    }

    fn name(&self) -> &str {
        "Cinematic Taxonomy"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, input: &PipelineData) -> Result<(), String> {
        match input {
            PipelineData::Segments(output) if output.segments.is_empty() => {
                Err("no segments to treat".to_string())
            }
            PipelineData::Segments(_) => Ok(()),
            other => Err(format!("expected segments input, got {}", other.kind())),
        }
    }

    async fn execute(
        &self,
        input: PipelineData,
        _ctx: StageContext,
    ) -> PipelineResult<PipelineData> {
        let segments = match input {
            PipelineData::Segments(output) => output.segments,
            other => {
                return Err(PipelineError::InvalidInput {
                    stage_id: TAXONOMY_STAGE_ID.to_string(),
                    predicate: format!("expected segments input, got {}", other.kind()),
                })
            }
        };

        let output = self
            .engine
            .apply_treatments(segments)
            .map_err(|error| PipelineError::ExecutionFailed {
                stage_id: TAXONOMY_STAGE_ID.to_string(),
                reason: error.to_string(),
            })?;
        Ok(PipelineData::Taxonomy(output))
    }
}

// ============================================================================
// Continuity
// ============================================================================

/// Validates scene-to-scene continuity and appends staging hints.
pub struct ContinuityStage {
    engine: ContinuityEngine,
    enabled: bool,
}

impl ContinuityStage {
    pub fn new(engine: ContinuityEngine) -> Self {
        Self {
            engine,
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[async_trait]
impl PipelineStage for ContinuityStage {
    fn id(&self) -> &str {
        CONTINUITY_STAGE_ID
    }

    fn name(&self) -> &str {
        "Continuity Validation"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, input: &PipelineData) -> Result<(), String> {
        match input.segments() {
            Some([]) => Err("no segments to validate".to_string()),
            Some(_) => Ok(()),
            None => Err(format!(
                "expected segments or taxonomy input, got {}",
                input.kind()
            )),
        }
    }

    async fn execute(
        &self,
        input: PipelineData,
        ctx: StageContext,
    ) -> PipelineResult<PipelineData> {
        let kind = input.kind();
        let Some(segments) = input.into_segments() else {
            return Err(PipelineError::InvalidInput {
                stage_id: CONTINUITY_STAGE_ID.to_string(),
                predicate: format!("expected segments or taxonomy input, got {kind}"),
            });
        };

        let report = self
            .engine
            .validate_segments(segments, &ctx.project_id)
            .await
            .map_err(|error| match error {
                ContinuityError::Store(cause) => PipelineError::ResourceUnavailable {
                    resource: format!("manifestation store: {cause}"),
                },
                other => PipelineError::ExecutionFailed {
                    stage_id: CONTINUITY_STAGE_ID.to_string(),
                    reason: other.to_string(),
                },
            })?;
        Ok(PipelineData::Continuity(report))
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Extracts structure, entities, and emotional shape from a story.
pub struct AnalysisStage {
    engine: AnalysisEngine,
    enabled: bool,
}

impl AnalysisStage {
    pub fn new(engine: AnalysisEngine) -> Self {
        Self {
            engine,
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[async_trait]
impl PipelineStage for AnalysisStage {
    fn id(&self) -> &str {
        ANALYSIS_STAGE_ID
    }

    fn name(&self) -> &str {
        "Story Analysis"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, input: &PipelineData) -> Result<(), String> {
        match input.prose() {
            Some(text) if text.trim().is_empty() => Err("input text is empty".to_string()),
            Some(text) if text.chars().count() > MAX_ANALYSIS_CHARS => {
                Err(format!("story exceeds {MAX_ANALYSIS_CHARS} characters"))
            }
            Some(_) => Ok(()),
            None => Err(format!(
                "expected text or reworded input, got {}",
                input.kind()
            )),
        }
    }

    async fn execute(
        &self,
        input: PipelineData,
        _ctx: StageContext,
    ) -> PipelineResult<PipelineData> {
        let kind = input.kind();
        let Some(text) = input.into_prose() else {
            return Err(PipelineError::InvalidInput {
                stage_id: ANALYSIS_STAGE_ID.to_string(),
                predicate: format!("expected text or reworded input, got {kind}"),
            });
        };

        Ok(PipelineData::Analysis(self.engine.analyze(&text)))
    }
}

// ============================================================================
// Rewording
// ============================================================================

/// Rewrites prose in a configured style before segmentation.
pub struct RewordingStage {
    engine: RewordingEngine,
    style: RewordingStyle,
    enabled: bool,
}

impl RewordingStage {
    pub fn new(engine: RewordingEngine, style: RewordingStyle) -> Self {
        Self {
            engine,
            style,
            enabled: true,
        }
    }

    pub fn style(&self) -> RewordingStyle {
        self.style
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[async_trait]
impl PipelineStage for RewordingStage {
    fn id(&self) -> &str {
        REWORDING_STAGE_ID
    }

    fn name(&self) -> &str {
        "Text Rewording"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, input: &PipelineData) -> Result<(), String> {
        if !self.engine.is_available() {
            return Err("text generation capability is unavailable".to_string());
        }
        match input {
            PipelineData::Text(text) if text.trim().is_empty() => {
                Err("input text is empty".to_string())
            }
            PipelineData::Text(text) if text.trim().chars().count() > MAX_REWORD_CHARS => {
                Err(format!("text exceeds {MAX_REWORD_CHARS} characters"))
            }
            PipelineData::Text(_) => Ok(()),
            other => Err(format!("expected text input, got {}", other.kind())),
        }
    }

    async fn execute(
        &self,
        input: PipelineData,
        _ctx: StageContext,
    ) -> PipelineResult<PipelineData> {
        let text = match input {
            PipelineData::Text(text) => text,
            other => {
                return Err(PipelineError::InvalidInput {
                    stage_id: REWORDING_STAGE_ID.to_string(),
                    predicate: format!("expected text input, got {}", other.kind()),
                })
            }
        };

        match self.engine.reword(&text, self.style).await {
            Ok(output) => Ok(PipelineData::Reworded(output)),
            Err(RewordingError::Unavailable) => Err(PipelineError::DependencyUnavailable {
                dependency: "text generation".to_string(),
            }),
            Err(RewordingError::Capability(cause)) => Err(PipelineError::DependencyUnavailable {
                dependency: format!("text generation: {cause}"),
            }),
            Err(error) => Err(PipelineError::InvalidInput {
                stage_id: REWORDING_STAGE_ID.to_string(),
                predicate: error.to_string(),
            }),
        }
    }
}
