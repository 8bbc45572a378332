//! Continuity validation engine.
//!
//! Walks the segment sequence with a one-scene memory window, discounting a
//! per-segment confidence for every continuity rule that fires, and appends
//! staging hints informed by lifetime manifestation telemetry. The overall
//! run confidence is the product of per-segment confidences, so long runs
//! trend toward zero; that decay is deliberate and has no floor.

mod anchors;
mod scene;

pub use anchors::{collect_anchors, ContinuityAnchor};
pub use scene::SceneState;

use crate::capability::{CapabilityError, SentimentScorer};
use crate::segment::Segment;
use crate::telemetry::{ContinuityState, ManifestationScore, ManifestationStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Confidence multiplier when a prop from the previous scene is missing.
const PROP_PERSISTENCE_PENALTY: f64 = 0.7;

/// Confidence multiplier when a character vanishes without a location change.
const CHARACTER_CONTINUITY_PENALTY: f64 = 0.5;

/// Confidence multiplier on a jarring tone shift.
const TONE_WHIPLASH_PENALTY: f64 = 0.6;

/// Confidence multiplier for a prop that rarely manifests.
const MANIFESTATION_RISK_PENALTY: f64 = 0.9;

/// Sentiment delta beyond which a tone shift counts as whiplash.
const TONE_WHIPLASH_THRESHOLD: f64 = 0.8;

/// Lifetime success rate below which a prop is a manifestation risk.
const MANIFESTATION_RISK_THRESHOLD: f64 = 0.3;

/// Lifetime success rate below which a prop earns a staging hint.
const MANIFESTATION_HINT_THRESHOLD: f64 = 0.5;

/// Overall confidence below which the run needs a human pass.
const HUMAN_REVIEW_THRESHOLD: f64 = 0.6;

/// Per-segment confidence below which its record is critical.
const CRITICAL_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Errors from continuity validation.
#[derive(Debug, Error)]
pub enum ContinuityError {
    /// Validation needs at least one segment.
    #[error("no segments to validate")]
    NoSegments,

    /// The manifestation store could not serve the run.
    #[error("manifestation store error: {0}")]
    Store(#[from] CapabilityError),
}

/// Severity of a per-segment continuity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Critical,
}

/// Per-segment continuity record: the confidence after every fired rule and
/// one message per rule fire. A clean segment has confidence 1.0 and no
/// messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuityIssue {
    pub segment_index: usize,
    pub confidence: f64,
    pub issues: Vec<String>,
    pub severity: IssueSeverity,
}

/// Output of one continuity validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuityReport {
    /// Segments with staging hints appended to their content.
    pub segments: Vec<Segment>,
    /// One anchor per recurring character.
    pub anchors: Vec<ContinuityAnchor>,
    /// One record per segment, in order.
    pub issues: Vec<ContinuityIssue>,
    /// Product of per-segment confidences.
    pub overall_confidence: f64,
    pub requires_human_review: bool,
}

/// The continuity validation engine. Holds no per-run state; every run loads
/// the telemetry table once and starts from a clean scene window.
pub struct ContinuityEngine {
    store: Arc<dyn ManifestationStore>,
    sentiment: Arc<dyn SentimentScorer>,
}

impl ContinuityEngine {
    pub fn new(store: Arc<dyn ManifestationStore>, sentiment: Arc<dyn SentimentScorer>) -> Self {
        Self { store, sentiment }
    }

    /// Validate a segment sequence and append staging hints.
    ///
    /// Scoring compares each segment against the single preceding scene only.
    /// The first segment is trivially clean. The advisory scene snapshot is
    /// saved under `project_id` at the end of the run; a failed save is
    /// logged, never an error.
    pub async fn validate_segments(
        &self,
        mut segments: Vec<Segment>,
        project_id: &str,
    ) -> Result<ContinuityReport, ContinuityError> {
        if segments.is_empty() {
            return Err(ContinuityError::NoSegments);
        }

        let scores = self.store.load_manifestation_scores().await?;

        let mut issues: Vec<ContinuityIssue> = Vec::new();
        let mut overall_confidence = 1.0_f64;
        let mut previous: Option<SceneState> = None;

        for segment in &segments {
            let current = SceneState::from_segment(segment);
            let (confidence, messages) = match &previous {
                Some(prev) => self.score_scene(prev, &current, &scores),
                None => (1.0, Vec::new()),
            };

            if !messages.is_empty() {
                tracing::debug!(
                    segment = segment.index,
                    confidence,
                    fired = messages.len(),
                    "Continuity rules fired"
                );
            }

            let severity = if confidence < CRITICAL_CONFIDENCE_THRESHOLD {
                IssueSeverity::Critical
            } else {
                IssueSeverity::Warning
            };
            issues.push(ContinuityIssue {
                segment_index: segment.index,
                confidence,
                issues: messages,
                severity,
            });

            overall_confidence *= confidence;
            previous = Some(current);
        }

        // Anchors and the advisory snapshot see the raw text, before hints.
        let anchors = collect_anchors(&segments);
        let last_scene = previous;

        self.enhance_segments(&mut segments, &scores);

        let state = ContinuityState::new(project_id, last_scene);
        if let Err(err) = self.store.save_state(&state).await {
            tracing::warn!(project_id, error = %err, "Failed to save continuity state");
        }

        let requires_human_review = overall_confidence < HUMAN_REVIEW_THRESHOLD;
        tracing::info!(
            segments = segments.len(),
            anchors = anchors.len(),
            overall_confidence,
            requires_human_review,
            "Continuity validation complete"
        );

        Ok(ContinuityReport {
            segments,
            anchors,
            issues,
            overall_confidence,
            requires_human_review,
        })
    }

    /// Record whether `element` actually appeared in generated output. The
    /// only write path into the telemetry table, decoupled from validation.
    pub async fn record_manifestation(
        &self,
        element: &str,
        appeared: bool,
    ) -> Result<(), ContinuityError> {
        self.store.save_telemetry(element, appeared).await?;
        Ok(())
    }

    /// Apply rules A through D for one scene transition. Returns the
    /// discounted confidence and one message per fired rule.
    fn score_scene(
        &self,
        prev: &SceneState,
        current: &SceneState,
        scores: &HashMap<String, ManifestationScore>,
    ) -> (f64, Vec<String>) {
        let mut confidence = 1.0_f64;
        let mut messages: Vec<String> = Vec::new();

        // A: props must persist scene to scene.
        for prop in &prev.props {
            if !current.props.contains(prop) {
                confidence *= PROP_PERSISTENCE_PENALTY;
                messages.push(format!("prop '{}' from the previous scene is missing", prop));
            }
        }

        // B: characters must persist while the location is unchanged.
        if prev.location == current.location {
            for character in &prev.characters {
                if !current.characters.contains(character) {
                    confidence *= CHARACTER_CONTINUITY_PENALTY;
                    messages.push(format!(
                        "character '{}' left the scene without a location change",
                        character
                    ));
                }
            }
        }

        // C: tone whiplash via the sentiment capability.
        let delta = (self.sentiment.score_sentiment(&prev.tone)
            - self.sentiment.score_sentiment(&current.tone))
        .abs();
        if delta > TONE_WHIPLASH_THRESHOLD {
            confidence *= TONE_WHIPLASH_PENALTY;
            messages.push(format!(
                "tone whiplash from '{}' to '{}'",
                prev.tone, current.tone
            ));
        }

        // D: props with a poor lifetime manifestation record. Warns only.
        for prop in &current.props {
            let rate = lifetime_rate(scores, prop);
            if rate < MANIFESTATION_RISK_THRESHOLD {
                confidence *= MANIFESTATION_RISK_PENALTY;
                messages.push(format!(
                    "prop '{}' has a low manifestation rate ({:.2})",
                    prop, rate
                ));
            }
        }

        (confidence, messages)
    }

    /// Append bracketed staging hints. Independent of scoring: runs for every
    /// segment, first included.
    fn enhance_segments(
        &self,
        segments: &mut [Segment],
        scores: &HashMap<String, ManifestationScore>,
    ) {
        let mut previous_characters: Option<Vec<String>> = None;

        for segment in segments.iter_mut() {
            let mut hints: Vec<String> = Vec::new();

            for prop in &segment.props {
                if lifetime_rate(scores, prop) < MANIFESTATION_HINT_THRESHOLD {
                    hints.push(format!("CLEARLY SHOWING {}", prop));
                }
            }

            if let Some(prev) = &previous_characters {
                for character in &segment.characters {
                    if prev.contains(character) {
                        hints.push(format!(
                            "{} with same appearance as previous scene",
                            character
                        ));
                    }
                }
            }

            previous_characters = Some(segment.characters.clone());

            for hint in hints {
                segment.content.push_str(&format!(" [{}]", hint));
            }
        }
    }
}

/// Lifetime success rate for an element, 0.8 when never attempted.
fn lifetime_rate(scores: &HashMap<String, ManifestationScore>, element: &str) -> f64 {
    scores
        .get(&element.to_lowercase())
        .copied()
        .unwrap_or_default()
        .rate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::KeywordSentiment;
    use crate::telemetry::InMemoryManifestationStore;

    fn engine_with_store() -> (ContinuityEngine, Arc<InMemoryManifestationStore>) {
        let store = Arc::new(InMemoryManifestationStore::new());
        let engine = ContinuityEngine::new(store.clone(), Arc::new(KeywordSentiment::new()));
        (engine, store)
    }

    fn segment(index: usize, content: &str) -> Segment {
        Segment::new(index, 2.0, content)
    }

    #[tokio::test]
    async fn test_lone_segment_is_trivially_clean() {
        let (engine, _) = engine_with_store();
        let report = engine
            .validate_segments(vec![segment(1, "A hero enters the forest.")], "p1")
            .await
            .unwrap();

        assert_eq!(report.overall_confidence, 1.0);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].confidence, 1.0);
        assert!(report.issues[0].issues.is_empty());
        assert!(!report.requires_human_review);
    }

    #[tokio::test]
    async fn test_missing_prop_discounts_by_point_seven() {
        let (engine, _) = engine_with_store();
        let mut first = segment(1, "The hero draws a sword.");
        first.props.push("sword".to_string());
        let second = segment(2, "The hero walks on.");

        let report = engine
            .validate_segments(vec![first, second], "p1")
            .await
            .unwrap();

        let record = &report.issues[1];
        assert!((record.confidence - 0.7).abs() < 1e-9);
        assert_eq!(record.issues.len(), 1);
        assert!(record.issues[0].contains("sword"));
        assert_eq!(record.severity, IssueSeverity::Warning);
        assert!((report.overall_confidence - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_character_in_same_location_is_critical() {
        let (engine, _) = engine_with_store();
        let mut first = segment(1, "Mara waits in the hall.");
        first.characters.push("Mara".to_string());
        let second = segment(2, "The hall stands empty.");

        let report = engine
            .validate_segments(vec![first, second], "p1")
            .await
            .unwrap();

        let record = &report.issues[1];
        assert!((record.confidence - 0.5).abs() < 1e-9);
        assert_eq!(record.severity, IssueSeverity::Critical);
        assert!(report.requires_human_review);
    }

    #[tokio::test]
    async fn test_location_change_suspends_character_rule() {
        let (engine, _) = engine_with_store();
        let mut first = segment(1, "Mara waits in the hall.");
        first.characters.push("Mara".to_string());
        first.location = "Hall".to_string();
        let mut second = segment(2, "The courtyard stands empty.");
        second.location = "Courtyard".to_string();

        let report = engine
            .validate_segments(vec![first, second], "p1")
            .await
            .unwrap();

        assert_eq!(report.issues[1].confidence, 1.0);
        assert!(report.issues[1].issues.is_empty());
    }

    #[tokio::test]
    async fn test_tone_whiplash_discounts_by_point_six() {
        let (engine, _) = engine_with_store();
        let mut first = segment(1, "Laughter fills the room.");
        first.tone = "Joyful".to_string();
        let mut second = segment(2, "The lights go out.");
        second.tone = "Despair".to_string();

        let report = engine
            .validate_segments(vec![first, second], "p1")
            .await
            .unwrap();

        let record = &report.issues[1];
        assert!((record.confidence - 0.6).abs() < 1e-9);
        assert!(record.issues[0].contains("tone whiplash"));
    }

    #[tokio::test]
    async fn test_risky_prop_warns_without_blocking() {
        let (engine, store) = engine_with_store();
        store.seed_score("sword", 3, 0).await;

        let mut first = segment(1, "The hero draws a sword.");
        first.props.push("sword".to_string());
        let mut second = segment(2, "The hero swings the sword.");
        second.props.push("sword".to_string());

        let report = engine
            .validate_segments(vec![first, second], "p1")
            .await
            .unwrap();

        let record = &report.issues[1];
        assert!((record.confidence - 0.9).abs() < 1e-9);
        assert_eq!(record.severity, IssueSeverity::Warning);
        assert!(record.issues[0].contains("manifestation rate"));
        assert!(!report.requires_human_review);
    }

    #[tokio::test]
    async fn test_overall_confidence_is_the_product() {
        let (engine, _) = engine_with_store();
        let mut first = segment(1, "The hero draws a sword.");
        first.props.push("sword".to_string());
        let second = segment(2, "The hero walks on.");
        let mut third = segment(3, "A door opens.");
        third.props.push("torch".to_string());

        // seg2 fires rule A (x0.7); seg3 is clean against seg2.
        let report = engine
            .validate_segments(vec![first, second, third], "p1")
            .await
            .unwrap();

        assert!((report.overall_confidence - 0.7).abs() < 1e-9);
        assert_eq!(report.issues[2].confidence, 1.0);
    }

    #[tokio::test]
    async fn test_hints_append_for_risky_props_even_on_first_segment() {
        let (engine, store) = engine_with_store();
        store.seed_score("sword", 5, 1).await; // rate 0.2 < 0.5

        let mut first = segment(1, "The hero draws a sword.");
        first.props.push("sword".to_string());

        let report = engine.validate_segments(vec![first], "p1").await.unwrap();

        assert_eq!(report.overall_confidence, 1.0);
        assert!(report.segments[0]
            .content
            .ends_with("[CLEARLY SHOWING sword]"));
    }

    #[tokio::test]
    async fn test_shared_character_gets_appearance_hint() {
        let (engine, _) = engine_with_store();
        let mut first = segment(1, "Mara lights the lamp.");
        first.characters.push("Mara".to_string());
        let mut second = segment(2, "Mara opens the door.");
        second.characters.push("Mara".to_string());

        let report = engine
            .validate_segments(vec![first, second], "p1")
            .await
            .unwrap();

        assert!(!report.segments[0].content.contains('['));
        assert!(report.segments[1]
            .content
            .ends_with("[Mara with same appearance as previous scene]"));
    }

    #[tokio::test]
    async fn test_anchors_use_text_before_hints() {
        let (engine, store) = engine_with_store();
        store.seed_score("lamp", 5, 0).await;

        let mut first = segment(1, "Mara lights the lamp.");
        first.characters.push("Mara".to_string());
        first.props.push("lamp".to_string());

        let report = engine.validate_segments(vec![first], "p1").await.unwrap();

        assert_eq!(report.anchors.len(), 1);
        assert_eq!(
            report.anchors[0].descriptions,
            vec!["Mara lights the lamp.".to_string()]
        );
        assert!(report.segments[0].content.contains("[CLEARLY SHOWING lamp]"));
    }

    #[tokio::test]
    async fn test_run_saves_advisory_state() {
        let (engine, store) = engine_with_store();
        let mut first = segment(1, "Mara lights the lamp.");
        first.location = "Hall".to_string();

        engine.validate_segments(vec![first], "p7").await.unwrap();

        let state = store.load_state("p7").await.unwrap().unwrap();
        let scene = state.last_scene.unwrap();
        assert_eq!(scene.location, "Hall");
        assert_eq!(scene.text, "Mara lights the lamp.");
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let (engine, _) = engine_with_store();
        let err = engine.validate_segments(Vec::new(), "p1").await.unwrap_err();
        assert!(matches!(err, ContinuityError::NoSegments));
    }

    #[tokio::test]
    async fn test_record_manifestation_feeds_next_run() {
        let (engine, store) = engine_with_store();
        for _ in 0..3 {
            engine.record_manifestation("Sword", false).await.unwrap();
        }

        let scores = store.load_manifestation_scores().await.unwrap();
        assert_eq!(scores["sword"].rate(), 0.0);
    }
}
