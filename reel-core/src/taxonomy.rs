//! Cinematic taxonomy engine.
//!
//! Reads the arc of a segmented story, then designs a camera treatment for
//! every segment: shot type, movement, angle, lighting, palette, mood,
//! composition, depth of field, and a transition suggestion. The treatment
//! is prepended to the segment content as a single directive line so that
//! downstream generation receives it inline.

use crate::segment::{
    CameraAngle, CameraMovement, CinematicTreatment, Lighting, Segment, ShotType,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the taxonomy engine.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    /// No segments were supplied.
    #[error("no segments to treat")]
    NoSegments,
}

/// Keyword tables driving every treatment decision. The tables are fixed at
/// construction; order matters wherever several cues could match.
#[derive(Debug, Clone)]
pub struct TaxonomyLexicon {
    /// Words that raise narrative intensity when present.
    pub emphasis_words: Vec<String>,
    /// Ordered tone labels with their trigger words.
    pub tone_cues: Vec<(String, Vec<String>)>,
    /// Spoken-scene verbs that call for a medium shot.
    pub speech_words: Vec<String>,
    /// Physical-action verbs that call for a full shot.
    pub action_words: Vec<String>,
    /// Emotional cues that call for a close-up.
    pub closeup_words: Vec<String>,
    /// Pursuit cues for a tracking move.
    pub tracking_words: Vec<String>,
    /// Revelation cues for a zoom.
    pub zoom_words: Vec<String>,
    /// Deliberate-motion cues for a slow dolly.
    pub dolly_words: Vec<String>,
    pub high_angle_words: Vec<String>,
    pub low_angle_words: Vec<String>,
    pub dutch_angle_words: Vec<String>,
    pub low_key_words: Vec<String>,
    pub high_key_words: Vec<String>,
    pub silhouette_words: Vec<String>,
    pub warm_palette_words: Vec<String>,
    pub cool_palette_words: Vec<String>,
    pub desaturated_palette_words: Vec<String>,
    /// Ordered mood keywords with their descriptions. The first keyword
    /// found in the segment decides the mood.
    pub mood_cues: Vec<(String, String)>,
    /// Cues for a cross-dissolve into the segment.
    pub cross_dissolve_words: Vec<String>,
    /// Cues for a hard cut into the segment.
    pub hard_cut_words: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for TaxonomyLexicon {
    fn default() -> Self {
        Self {
            emphasis_words: words(&["very", "extremely", "incredibly", "absolutely"]),
            tone_cues: vec![
                ("dark".to_string(), words(&["dark", "scary", "fear"])),
                ("light".to_string(), words(&["happy", "joy", "laugh"])),
                ("dreamlike".to_string(), words(&["dream", "surreal"])),
            ],
            speech_words: words(&["said", "asked"]),
            action_words: words(&["ran", "jumped", "moved"]),
            closeup_words: words(&["tears", "smiled", "whispered", "stared"]),
            tracking_words: words(&["ran", "chase", "rushed"]),
            zoom_words: words(&["revealed", "suddenly", "appeared"]),
            dolly_words: words(&["slowly", "careful"]),
            high_angle_words: words(&["tower", "above", "looked down"]),
            low_angle_words: words(&["small", "vulnerable", "looked up"]),
            dutch_angle_words: words(&["dizzy", "confused", "dream"]),
            low_key_words: words(&["night", "dark", "shadow"]),
            high_key_words: words(&["bright", "sunlight", "morning"]),
            silhouette_words: words(&["dream", "surreal"]),
            warm_palette_words: words(&["warm", "sunset", "fire"]),
            cool_palette_words: words(&["cold", "ice", "blue"]),
            desaturated_palette_words: words(&["dream", "memory"]),
            mood_cues: vec![
                ("tense".to_string(), "Tense, suspenseful".to_string()),
                ("peaceful".to_string(), "Calm, serene".to_string()),
                ("chaotic".to_string(), "Frenetic, overwhelming".to_string()),
                ("intimate".to_string(), "Intimate, personal".to_string()),
                ("epic".to_string(), "Epic, grand".to_string()),
                ("mysterious".to_string(), "Mysterious, enigmatic".to_string()),
                ("joyful".to_string(), "Joyful, uplifting".to_string()),
                ("melancholic".to_string(), "Melancholic, bittersweet".to_string()),
            ],
            cross_dissolve_words: words(&["meanwhile", "elsewhere"]),
            hard_cut_words: words(&["suddenly", "then"]),
        }
    }
}

/// Shape of the story as a whole: act boundaries, intensity curve, where
/// the climax falls, and the dominant tone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeArc {
    pub total_segments: usize,
    pub act1_end: usize,
    pub act2_end: usize,
    pub climax_position: usize,
    pub intensity_curve: Vec<f64>,
    pub overall_tone: String,
}

impl NarrativeArc {
    pub fn summary(&self) -> String {
        format!(
            "total={}, climax@{}, tone={}",
            self.total_segments, self.climax_position, self.overall_tone
        )
    }
}

/// Output of one taxonomy pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyOutput {
    pub segments: Vec<Segment>,
    pub arc: NarrativeArc,
}

/// The taxonomy engine.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyEngine {
    lexicon: TaxonomyLexicon,
}

impl TaxonomyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lexicon(lexicon: TaxonomyLexicon) -> Self {
        Self { lexicon }
    }

    /// Design a treatment for every segment and prepend its directive line
    /// to the segment content.
    pub fn apply_treatments(
        &self,
        mut segments: Vec<Segment>,
    ) -> Result<TaxonomyOutput, TaxonomyError> {
        if segments.is_empty() {
            return Err(TaxonomyError::NoSegments);
        }

        let arc = self.analyze_arc(&segments);
        let total = segments.len();

        for (position, segment) in segments.iter_mut().enumerate() {
            let treatment = self.design_treatment(segment, position, total, &arc);
            segment.content = format!("{}\n{}", treatment.directive_line(), segment.content);
            segment.treatment = Some(treatment);
        }

        tracing::info!(arc = %arc.summary(), "Applied cinematic treatments");

        Ok(TaxonomyOutput { segments, arc })
    }

    // ========================================================================
    // Arc Analysis
    // ========================================================================

    fn analyze_arc(&self, segments: &[Segment]) -> NarrativeArc {
        let total = segments.len();
        let intensity_curve: Vec<f64> = segments
            .iter()
            .map(|s| self.estimate_intensity(&s.content))
            .collect();

        NarrativeArc {
            total_segments: total,
            act1_end: total / 4,
            act2_end: total * 3 / 4,
            climax_position: climax_index(&intensity_curve, total),
            overall_tone: self.detect_tone(segments),
            intensity_curve,
        }
    }

    /// Intensity in [0, 1] from exclamation and question marks plus
    /// half-weight emphasis words.
    fn estimate_intensity(&self, content: &str) -> f64 {
        let punctuation = content.chars().filter(|c| *c == '!' || *c == '?').count() as f64;
        let lowered = content.to_lowercase();
        let emphasis = self
            .lexicon
            .emphasis_words
            .iter()
            .filter(|w| lowered.contains(w.as_str()))
            .count() as f64;
        ((punctuation + 0.5 * emphasis) / 5.0).min(1.0)
    }

    fn detect_tone(&self, segments: &[Segment]) -> String {
        let combined = segments
            .iter()
            .map(|s| s.content.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        for (tone, cues) in &self.lexicon.tone_cues {
            if cues.iter().any(|c| combined.contains(c.as_str())) {
                return tone.clone();
            }
        }
        "neutral".to_string()
    }

    // ========================================================================
    // Treatment Design
    // ========================================================================

    fn design_treatment(
        &self,
        segment: &Segment,
        position: usize,
        total: usize,
        arc: &NarrativeArc,
    ) -> CinematicTreatment {
        let normalized = position as f64 / total.saturating_sub(1).max(1) as f64;
        let text = segment.content.to_lowercase();

        let shot_type = self.select_shot(&text, normalized, arc);
        CinematicTreatment {
            camera_movement: self.select_movement(&text, normalized),
            camera_angle: self.select_angle(&text),
            lighting: self.select_lighting(&text, &arc.overall_tone),
            color_palette: self.select_palette(&text, &arc.overall_tone),
            mood: self.select_mood(&text),
            composition: composition_for(shot_type).to_string(),
            depth_of_field: depth_of_field_for(shot_type).to_string(),
            transition_suggestion: self.suggest_transition(&text, normalized).to_string(),
            shot_type,
        }
    }

    fn select_shot(&self, text: &str, normalized: f64, arc: &NarrativeArc) -> ShotType {
        // Openings and endings establish or release the scene.
        if normalized < 0.1 || normalized > 0.9 {
            return ShotType::Wide;
        }
        if text.contains('"') || contains_any(text, &self.lexicon.speech_words) {
            return ShotType::Medium;
        }
        if contains_any(text, &self.lexicon.action_words) {
            return ShotType::Full;
        }
        if contains_any(text, &self.lexicon.closeup_words) {
            return ShotType::CloseUp;
        }

        let climax = arc.climax_position as f64 / arc.total_segments as f64;
        if (climax - normalized).abs() < 0.1 {
            return ShotType::ExtremeCloseUp;
        }
        ShotType::Medium
    }

    fn select_movement(&self, text: &str, normalized: f64) -> CameraMovement {
        if normalized < 0.05 {
            return CameraMovement::DollyIn;
        }
        if contains_any(text, &self.lexicon.tracking_words) {
            return CameraMovement::Tracking;
        }
        if contains_any(text, &self.lexicon.zoom_words) {
            return CameraMovement::Zoom;
        }
        if contains_any(text, &self.lexicon.dolly_words) {
            return CameraMovement::Dolly;
        }
        CameraMovement::Static
    }

    fn select_angle(&self, text: &str) -> CameraAngle {
        if contains_any(text, &self.lexicon.high_angle_words) {
            return CameraAngle::High;
        }
        if contains_any(text, &self.lexicon.low_angle_words) {
            return CameraAngle::Low;
        }
        if contains_any(text, &self.lexicon.dutch_angle_words) {
            return CameraAngle::Dutch;
        }
        CameraAngle::EyeLevel
    }

    fn select_lighting(&self, text: &str, overall_tone: &str) -> Lighting {
        if contains_any(text, &self.lexicon.low_key_words) {
            return Lighting::LowKey;
        }
        if contains_any(text, &self.lexicon.high_key_words) {
            return Lighting::HighKey;
        }
        if overall_tone == "dark" || overall_tone == "tense" {
            return Lighting::Dramatic;
        }
        if contains_any(text, &self.lexicon.silhouette_words) {
            return Lighting::Silhouette;
        }
        Lighting::Natural
    }

    fn select_palette(&self, text: &str, overall_tone: &str) -> String {
        if contains_any(text, &self.lexicon.warm_palette_words) {
            return "Warm (oranges, reds, yellows)".to_string();
        }
        if contains_any(text, &self.lexicon.cool_palette_words) {
            return "Cool (blues, teals, silvers)".to_string();
        }
        if contains_any(text, &self.lexicon.desaturated_palette_words) {
            return "Desaturated (muted, nostalgic)".to_string();
        }
        if overall_tone == "dark" {
            return "Dark (deep blues, blacks, minimal color)".to_string();
        }
        "Natural (balanced, realistic)".to_string()
    }

    fn select_mood(&self, text: &str) -> String {
        for (keyword, description) in &self.lexicon.mood_cues {
            if text.contains(keyword.as_str()) {
                return description.clone();
            }
        }
        "Neutral, observational".to_string()
    }

    fn suggest_transition(&self, text: &str, normalized: f64) -> &'static str {
        if normalized < 0.05 {
            return "Fade in from black";
        }
        if normalized > 0.95 {
            return "Fade to black";
        }
        if contains_any(text, &self.lexicon.cross_dissolve_words) {
            return "Cross-dissolve";
        }
        if contains_any(text, &self.lexicon.hard_cut_words) {
            return "Hard cut";
        }
        "Standard cut"
    }
}

fn contains_any(text: &str, cues: &[String]) -> bool {
    cues.iter().any(|c| text.contains(c.as_str()))
}

/// Index of the intensity peak. Ties go to the later segment; a flat curve
/// places the climax at the three-quarter mark.
fn climax_index(curve: &[f64], total: usize) -> usize {
    let flat = curve.windows(2).all(|w| w[0] == w[1]);
    if flat {
        return total * 3 / 4;
    }

    let mut best = 0;
    for (index, value) in curve.iter().enumerate() {
        if *value >= curve[best] {
            best = index;
        }
    }
    best
}

fn composition_for(shot: ShotType) -> &'static str {
    match shot {
        ShotType::Wide => "Rule of thirds, subject in lower third or asymmetric",
        ShotType::Full | ShotType::Medium => "Centered or slightly off-center, balanced",
        ShotType::CloseUp | ShotType::ExtremeCloseUp => {
            "Face/subject fills frame, minimal negative space"
        }
    }
}

fn depth_of_field_for(shot: ShotType) -> &'static str {
    match shot {
        ShotType::Wide => "Deep focus (f/8-f/16)",
        ShotType::Medium | ShotType::Full => "Moderate depth (f/4-f/5.6)",
        ShotType::CloseUp | ShotType::ExtremeCloseUp => "Shallow focus (f/1.8-f/2.8)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_segments(count: usize) -> Vec<Segment> {
        (0..count)
            .map(|i| Segment::new(i + 1, 2.0, format!("Plain narration number {}", i + 1)))
            .collect()
    }

    #[test]
    fn test_first_and_last_segments_get_wide_shots() {
        let out = TaxonomyEngine::new()
            .apply_treatments(plain_segments(10))
            .unwrap();

        let first = out.segments.first().unwrap().treatment.as_ref().unwrap();
        let last = out.segments.last().unwrap().treatment.as_ref().unwrap();
        assert_eq!(first.shot_type, ShotType::Wide);
        assert_eq!(last.shot_type, ShotType::Wide);
    }

    #[test]
    fn test_directive_line_is_prepended_once() {
        let out = TaxonomyEngine::new()
            .apply_treatments(plain_segments(3))
            .unwrap();

        let first = &out.segments[0];
        assert!(first.content.starts_with("[SHOT: Wide Shot (WS) | CAMERA: Dolly In, Eye Level"));
        let (directive, body) = first.content.split_once('\n').unwrap();
        assert!(directive.ends_with(']'));
        assert_eq!(body, "Plain narration number 1");
    }

    #[test]
    fn test_climax_falls_on_most_intense_segment() {
        let mut segments = plain_segments(10);
        segments[7].content = "Everything broke at once!!!".to_string();
        let out = TaxonomyEngine::new().apply_treatments(segments).unwrap();

        assert_eq!(out.arc.climax_position, 7);
        assert_eq!(out.arc.total_segments, 10);
        assert_eq!(out.arc.act1_end, 2);
        assert_eq!(out.arc.act2_end, 7);
    }

    #[test]
    fn test_flat_curve_places_climax_at_three_quarters() {
        let out = TaxonomyEngine::new()
            .apply_treatments(plain_segments(8))
            .unwrap();
        assert_eq!(out.arc.climax_position, 6);
    }

    #[test]
    fn test_intensity_ties_go_to_the_later_segment() {
        let mut segments = plain_segments(6);
        segments[1].content = "A shout rang out!".to_string();
        segments[4].content = "Another shout rang!".to_string();
        let out = TaxonomyEngine::new().apply_treatments(segments).unwrap();
        assert_eq!(out.arc.climax_position, 4);
    }

    #[test]
    fn test_intensity_counts_punctuation_and_emphasis() {
        let engine = TaxonomyEngine::new();
        assert_eq!(engine.estimate_intensity("Calm words."), 0.0);
        assert!((engine.estimate_intensity("Stop! Now!") - 0.4).abs() < 1e-9);
        assert!((engine.estimate_intensity("It was very cold.") - 0.1).abs() < 1e-9);
        assert_eq!(engine.estimate_intensity("No!!! Why?!?! Really?!"), 1.0);
    }

    #[test]
    fn test_tone_order_prefers_dark() {
        let mut segments = plain_segments(2);
        segments[0].content = "A happy song in a scary wood.".to_string();
        let out = TaxonomyEngine::new().apply_treatments(segments).unwrap();
        assert_eq!(out.arc.overall_tone, "dark");
    }

    #[test]
    fn test_dialogue_segment_gets_medium_shot() {
        let mut segments = plain_segments(10);
        segments[5].content = "\"Stay close,\" the guide said.".to_string();
        let out = TaxonomyEngine::new().apply_treatments(segments).unwrap();

        let treated = out.segments[5].treatment.as_ref().unwrap();
        assert_eq!(treated.shot_type, ShotType::Medium);
        assert!(out.segments[5].content.contains("Medium Shot (MS)"));
    }

    #[test]
    fn test_segment_near_climax_gets_extreme_close_up() {
        let mut segments = plain_segments(11);
        segments[5].content = "Everything converged at last!!!".to_string();
        let out = TaxonomyEngine::new().apply_treatments(segments).unwrap();

        assert_eq!(out.arc.climax_position, 5);
        let treated = out.segments[5].treatment.as_ref().unwrap();
        assert_eq!(treated.shot_type, ShotType::ExtremeCloseUp);
    }

    #[test]
    fn test_lighting_palette_and_angle_cues() {
        let mut segments = plain_segments(10);
        segments[3].content = "Night pressed on the tower at sunset.".to_string();
        let out = TaxonomyEngine::new().apply_treatments(segments).unwrap();

        let treated = out.segments[3].treatment.as_ref().unwrap();
        assert_eq!(treated.lighting, Lighting::LowKey);
        assert_eq!(treated.camera_angle, CameraAngle::High);
        assert_eq!(treated.color_palette, "Warm (oranges, reds, yellows)");
    }

    #[test]
    fn test_composition_and_depth_follow_shot() {
        assert_eq!(composition_for(ShotType::Wide), "Rule of thirds, subject in lower third or asymmetric");
        assert_eq!(depth_of_field_for(ShotType::Wide), "Deep focus (f/8-f/16)");
        assert_eq!(depth_of_field_for(ShotType::CloseUp), "Shallow focus (f/1.8-f/2.8)");
        assert_eq!(composition_for(ShotType::Medium), "Centered or slightly off-center, balanced");
    }

    #[test]
    fn test_mood_order_decides_between_cues() {
        let engine = TaxonomyEngine::new();
        assert_eq!(engine.select_mood("a tense and joyful reunion"), "Tense, suspenseful");
        assert_eq!(engine.select_mood("a joyful reunion"), "Joyful, uplifting");
        assert_eq!(engine.select_mood("nothing much"), "Neutral, observational");
    }

    #[test]
    fn test_transition_suggestions() {
        let engine = TaxonomyEngine::new();
        assert_eq!(engine.suggest_transition("any", 0.0), "Fade in from black");
        assert_eq!(engine.suggest_transition("any", 1.0), "Fade to black");
        assert_eq!(engine.suggest_transition("meanwhile, far away", 0.5), "Cross-dissolve");
        assert_eq!(engine.suggest_transition("then it fell", 0.5), "Hard cut");
        assert_eq!(engine.suggest_transition("the road went on", 0.5), "Standard cut");
    }

    #[test]
    fn test_custom_lexicon_is_honored() {
        let mut lexicon = TaxonomyLexicon::default();
        lexicon
            .mood_cues
            .insert(0, ("tavern".to_string(), "Rowdy, warm".to_string()));
        let engine = TaxonomyEngine::with_lexicon(lexicon);
        assert_eq!(engine.select_mood("the tavern roared"), "Rowdy, warm");
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            TaxonomyEngine::new().apply_treatments(Vec::new()),
            Err(TaxonomyError::NoSegments)
        ));
    }

    #[test]
    fn test_arc_summary_format() {
        let arc = NarrativeArc {
            total_segments: 10,
            act1_end: 2,
            act2_end: 7,
            climax_position: 7,
            intensity_curve: vec![0.0; 10],
            overall_tone: "dark".to_string(),
        };
        assert_eq!(arc.summary(), "total=10, climax@7, tone=dark");
    }
}
