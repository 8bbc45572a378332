//! The stage contract and the data envelope passed between stages.
//!
//! Every pipeline stage consumes one [`PipelineData`] variant and produces
//! another. The orchestrator never inspects payloads; it only moves envelopes
//! from one stage to the next and records them per stage id.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::AnalysisOutput;
use crate::continuity::ContinuityReport;
use crate::error::PipelineResult;
use crate::rewording::RewordingOutput;
use crate::segment::Segment;
use crate::segmentation::SegmentationOutput;
use crate::taxonomy::TaxonomyOutput;

// ============================================================================
// Pipeline Data
// ============================================================================

/// Typed payload flowing through the pipeline.
///
/// Stages declare which variants they accept via [`PipelineStage::validate`];
/// a rejected variant fails fast before any work is spawned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineData {
    /// Raw prose, the entry point of every run.
    Text(String),
    /// Segments plus the style and metrics that produced them.
    Segments(SegmentationOutput),
    /// Segments carrying cinematic treatments plus the narrative arc.
    Taxonomy(TaxonomyOutput),
    /// Continuity report over a segment sequence.
    Continuity(ContinuityReport),
    /// Story analysis with its extraction provenance.
    Analysis(AnalysisOutput),
    /// Rewritten prose alongside the original.
    Reworded(RewordingOutput),
}

impl PipelineData {
    /// Short variant name used in validation messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Segments(_) => "segments",
            Self::Taxonomy(_) => "taxonomy",
            Self::Continuity(_) => "continuity",
            Self::Analysis(_) => "analysis",
            Self::Reworded(_) => "reworded",
        }
    }

    /// The raw text, if this is a `Text` envelope.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The prose this envelope carries: raw text, or the rewritten text of a
    /// `Reworded` envelope. Lets rewording chain into text-consuming stages.
    pub fn prose(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Reworded(output) => Some(&output.reworded),
            _ => None,
        }
    }

    /// Consume the envelope and take its prose.
    pub fn into_prose(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Reworded(output) => Some(output.reworded),
            _ => None,
        }
    }

    /// The segment sequence, for every variant that carries one.
    pub fn segments(&self) -> Option<&[Segment]> {
        match self {
            Self::Segments(output) => Some(&output.segments),
            Self::Taxonomy(output) => Some(&output.segments),
            Self::Continuity(report) => Some(&report.segments),
            _ => None,
        }
    }

    /// Consume the envelope and take its segment sequence.
    pub fn into_segments(self) -> Option<Vec<Segment>> {
        match self {
            Self::Segments(output) => Some(output.segments),
            Self::Taxonomy(output) => Some(output.segments),
            Self::Continuity(report) => Some(report.segments),
            _ => None,
        }
    }
}

// ============================================================================
// Stage Context
// ============================================================================

/// Per-run execution context handed to every stage.
///
/// A fresh context means a fresh `execution_id`; runs never share state
/// through the context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageContext {
    /// Unique id for this pipeline run.
    pub execution_id: Uuid,
    /// Project the run belongs to. Continuity snapshots key off this.
    pub project_id: String,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// Free-form annotations carried across stages.
    pub metadata: HashMap<String, String>,
}

impl StageContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            project_id: project_id.into(),
            started_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

impl Default for StageContext {
    fn default() -> Self {
        Self::new("default")
    }
}

// ============================================================================
// Stage Trait
// ============================================================================

/// A unit of pipeline work.
///
/// Implementations must be stateless across calls; the orchestrator may run
/// the same stage concurrently for unrelated inputs.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stable identifier. Registration, result maps, and events key off it.
    fn id(&self) -> &str;

    /// Human-readable name for display.
    fn name(&self) -> &str;

    /// Disabled stages are rejected before validation runs.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Cheap input check run before any work is spawned.
    ///
    /// `Err` carries the failing predicate, worded for an error message.
    fn validate(&self, input: &PipelineData) -> Result<(), String>;

    /// Run the stage to completion.
    ///
    /// Deadline enforcement is the orchestrator's job; implementations just
    /// do the work.
    async fn execute(&self, input: PipelineData, ctx: StageContext) -> PipelineResult<PipelineData>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{NarrativeStyle, SegmentationMetrics};

    fn segments_envelope() -> PipelineData {
        PipelineData::Segments(SegmentationOutput {
            segments: vec![Segment::new(1, 3.0, "A door creaked open.")],
            style: NarrativeStyle::Structured,
            metrics: SegmentationMetrics::default(),
        })
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(PipelineData::Text("x".to_string()).kind(), "text");
        assert_eq!(segments_envelope().kind(), "segments");
    }

    #[test]
    fn test_as_text() {
        let data = PipelineData::Text("hello".to_string());
        assert_eq!(data.as_text(), Some("hello"));
        assert!(segments_envelope().as_text().is_none());
    }

    #[test]
    fn test_prose_covers_reworded() {
        let reworded = PipelineData::Reworded(RewordingOutput {
            original: "thou art".to_string(),
            reworded: "you are".to_string(),
            style: crate::rewording::RewordingStyle::ModernizeOldEnglish,
        });
        assert_eq!(reworded.prose(), Some("you are"));
        assert!(reworded.as_text().is_none());
        assert_eq!(reworded.into_prose(), Some("you are".to_string()));

        assert!(segments_envelope().prose().is_none());
    }

    #[test]
    fn test_segments_accessor() {
        let data = segments_envelope();
        let segments = data.segments().unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].content, "A door creaked open.");

        assert!(PipelineData::Text("x".to_string()).segments().is_none());
    }

    #[test]
    fn test_into_segments() {
        let segments = segments_envelope().into_segments().unwrap();
        assert_eq!(segments.len(), 1);
        assert!(PipelineData::Text("x".to_string()).into_segments().is_none());
    }

    #[test]
    fn test_context_ids_are_unique() {
        let a = StageContext::new("proj");
        let b = StageContext::new("proj");
        assert_ne!(a.execution_id, b.execution_id);
    }

    #[test]
    fn test_default_context_project() {
        let ctx = StageContext::default();
        assert_eq!(ctx.project_id, "default");
        assert!(ctx.metadata.is_empty());
    }
}
