//! Segment data model shared by every pipeline stage.
//!
//! Segments are created once by the segmentation engine, then mutated in
//! place by the enrichment stages: taxonomy prefixes a technical directive
//! onto the content and attaches a [`CinematicTreatment`], continuity appends
//! staging hints. Indices are 1-based and stay contiguous through any
//! re-split.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Segment
// ============================================================================

/// One duration-bounded unit of narrative content destined for one generated
/// clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based position in the run, contiguous across the sequence.
    pub index: usize,

    /// Estimated spoken duration in seconds at narration speed.
    pub target_duration_secs: f64,

    /// Narrative text for this clip. Never empty.
    pub content: String,

    /// Characters present in this segment.
    pub characters: Vec<String>,

    /// Scene setting description.
    pub setting: String,

    /// Primary action description.
    pub action: String,

    /// Free-form notes carried into the continuity pass.
    pub continuity_notes: String,

    /// Where the segment takes place.
    pub location: String,

    /// Physical objects that must appear in the generated clip.
    pub props: Vec<String>,

    /// Emotional tone label.
    pub tone: String,

    /// Pacing classification from word count and sequence position.
    #[serde(default)]
    pub pacing: Pacing,

    /// How this segment is entered from the previous one.
    #[serde(default)]
    pub lead_transition: TransitionKind,

    /// Production metadata attached by the taxonomy stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment: Option<CinematicTreatment>,
}

impl Segment {
    /// Create a segment with placeholder scene fields. Content is trimmed;
    /// scene details are filled in by downstream analysis.
    pub fn new(index: usize, target_duration_secs: f64, content: impl Into<String>) -> Self {
        Self {
            index,
            target_duration_secs,
            content: content.into().trim().to_string(),
            characters: Vec::new(),
            setting: "Unknown Setting".to_string(),
            action: "Unknown Action".to_string(),
            continuity_notes: String::new(),
            location: "Unknown Location".to_string(),
            props: Vec::new(),
            tone: "Neutral".to_string(),
            pacing: Pacing::Moderate,
            lead_transition: TransitionKind::Cut,
            treatment: None,
        }
    }

    /// Number of non-empty whitespace-separated words in the content.
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

// ============================================================================
// Pacing & Transitions
// ============================================================================

/// Pacing classification for video generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pacing {
    Fast,
    #[default]
    Moderate,
    Slow,
    Building,
}

impl Pacing {
    pub fn name(&self) -> &'static str {
        match self {
            Pacing::Fast => "Fast",
            Pacing::Moderate => "Moderate",
            Pacing::Slow => "Slow",
            Pacing::Building => "Building",
        }
    }
}

impl fmt::Display for Pacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How one segment hands off to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    #[default]
    Cut,
    Temporal,
    Spatial,
    Dialogue,
    /// Opening segment, or no usable cue from the previous one.
    Hard,
}

impl TransitionKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransitionKind::Cut => "Cut",
            TransitionKind::Temporal => "Temporal",
            TransitionKind::Spatial => "Spatial",
            TransitionKind::Dialogue => "Dialogue",
            TransitionKind::Hard => "Hard",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Cinematic Treatment
// ============================================================================

/// Framing distance for a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShotType {
    Wide,
    Full,
    Medium,
    CloseUp,
    ExtremeCloseUp,
}

impl ShotType {
    pub fn name(&self) -> &'static str {
        match self {
            ShotType::Wide => "Wide Shot (WS)",
            ShotType::Full => "Full Shot (FS)",
            ShotType::Medium => "Medium Shot (MS)",
            ShotType::CloseUp => "Close-Up (CU)",
            ShotType::ExtremeCloseUp => "Extreme Close-Up (ECU)",
        }
    }
}

impl fmt::Display for ShotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Camera movement over the course of a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraMovement {
    Static,
    Dolly,
    DollyIn,
    Tracking,
    Zoom,
}

impl CameraMovement {
    pub fn name(&self) -> &'static str {
        match self {
            CameraMovement::Static => "Static",
            CameraMovement::Dolly => "Dolly",
            CameraMovement::DollyIn => "Dolly In",
            CameraMovement::Tracking => "Tracking",
            CameraMovement::Zoom => "Zoom",
        }
    }
}

impl fmt::Display for CameraMovement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Vertical camera placement relative to the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraAngle {
    EyeLevel,
    High,
    Low,
    Dutch,
}

impl CameraAngle {
    pub fn name(&self) -> &'static str {
        match self {
            CameraAngle::EyeLevel => "Eye Level",
            CameraAngle::High => "High Angle",
            CameraAngle::Low => "Low Angle",
            CameraAngle::Dutch => "Dutch Angle",
        }
    }
}

impl fmt::Display for CameraAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Lighting style for a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lighting {
    Natural,
    HighKey,
    LowKey,
    Dramatic,
    Silhouette,
}

impl Lighting {
    pub fn name(&self) -> &'static str {
        match self {
            Lighting::Natural => "Natural",
            Lighting::HighKey => "High Key",
            Lighting::LowKey => "Low Key",
            Lighting::Dramatic => "Dramatic",
            Lighting::Silhouette => "Silhouette",
        }
    }
}

impl fmt::Display for Lighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Production metadata bundle attached to a segment by the taxonomy stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CinematicTreatment {
    pub shot_type: ShotType,
    pub camera_movement: CameraMovement,
    pub camera_angle: CameraAngle,
    pub lighting: Lighting,
    pub color_palette: String,
    pub mood: String,
    pub composition: String,
    pub depth_of_field: String,
    pub transition_suggestion: String,
}

impl CinematicTreatment {
    /// One-line technical directive for prepending to segment content.
    pub fn directive_line(&self) -> String {
        format!(
            "[SHOT: {} | CAMERA: {}, {} | LIGHTING: {} | MOOD: {}]",
            self.shot_type.name(),
            self.camera_movement.name(),
            self.camera_angle.name(),
            self.lighting.name(),
            self.mood
        )
    }
}

// ============================================================================
// Segmentation Output Types
// ============================================================================

/// Narrative style detected from the structure of the input text. Drives the
/// choice of packing unit (paragraph, line, or sentence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NarrativeStyle {
    /// Long paragraphs, conventional prose. Packed by paragraph.
    Structured,
    /// Majority of paragraphs carry quoted speech. Packed by line.
    Dialogue,
    /// Short paragraphs, flowing prose. Packed by sentence.
    Stream,
    /// Short sentences. Packed by sentence.
    Fragmented,
}

impl NarrativeStyle {
    pub fn name(&self) -> &'static str {
        match self {
            NarrativeStyle::Structured => "structured",
            NarrativeStyle::Dialogue => "dialogue",
            NarrativeStyle::Stream => "stream",
            NarrativeStyle::Fragmented => "fragmented",
        }
    }
}

impl fmt::Display for NarrativeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Quality metrics over one segmentation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentationMetrics {
    pub average_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub standard_deviation: f64,
    /// How close the mean duration landed to the ceiling, in [0, 1].
    pub quality_score: f64,
    /// Duration uniformity across segments, in [0, 1].
    pub boundary_quality: f64,
    pub pacing_consistency: f64,
}
