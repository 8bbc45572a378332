//! Prose-to-storyboard pipeline engine.
//!
//! This crate turns free-form prose into an ordered sequence of timed,
//! cinematically annotated video segments:
//! - Narrative-aware segmentation under a per-segment duration ceiling
//! - Automatic cinematic treatments (shot, camera, lighting, mood)
//! - Scene-to-scene continuity validation with staging hints
//! - Heuristic story analysis that degrades instead of failing
//! - Style rewording through a pluggable text-generation backend
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use reel_core::{
//!     ContinuityEngine, ContinuityStage, InMemoryManifestationStore, KeywordSentiment,
//!     Orchestrator, SegmentationStage, TaxonomyStage, DEFAULT_PIPELINE_ORDER,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut orchestrator = Orchestrator::new();
//!     orchestrator.register(Arc::new(SegmentationStage::new()));
//!     orchestrator.register(Arc::new(TaxonomyStage::new()));
//!     orchestrator.register(Arc::new(ContinuityStage::new(ContinuityEngine::new(
//!         Arc::new(InMemoryManifestationStore::new()),
//!         Arc::new(KeywordSentiment),
//!     ))));
//!
//!     let run = orchestrator
//!         .run_pipeline(&DEFAULT_PIPELINE_ORDER, "A door creaked open...", "demo")
//!         .await;
//!     println!("stages completed: {}", run.outputs.len());
//! }
//! ```

pub mod analysis;
pub mod capability;
pub mod continuity;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod rewording;
pub mod segment;
pub mod segmentation;
pub mod stage;
pub mod stages;
pub mod taxonomy;
pub mod telemetry;
pub mod testing;

// Primary public API
pub use analysis::{AnalysisEngine, AnalysisOutput, ExtractionMethod};
pub use capability::{KeywordSentiment, SentimentScorer, TextGeneration};
pub use continuity::{ContinuityEngine, ContinuityReport};
pub use error::{PipelineError, PipelineResult};
pub use events::{EventBus, EventSubscriber, PipelineEvent};
pub use orchestrator::{
    Orchestrator, PipelineProgress, PipelineRun, MEDIA_STAGE_DEADLINE, TEXT_STAGE_DEADLINE,
};
pub use rewording::{RewordingEngine, RewordingOutput, RewordingStyle};
pub use segment::{CinematicTreatment, NarrativeStyle, Segment};
pub use segmentation::{SegmentationEngine, SegmentationOutput};
pub use stage::{PipelineData, PipelineStage, StageContext};
pub use stages::{
    AnalysisStage, ContinuityStage, RewordingStage, SegmentationStage, TaxonomyStage,
    DEFAULT_PIPELINE_ORDER,
};
pub use taxonomy::{TaxonomyEngine, TaxonomyOutput};
pub use telemetry::{InMemoryManifestationStore, ManifestationStore};
pub use testing::MockGeneration;
