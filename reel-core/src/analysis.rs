//! Heuristic story analysis.
//!
//! Multi-phase extraction over raw prose: structure, entities, locations,
//! scenes, dialogue, themes, and an emotional arc. The extraction is
//! keyword-driven and deliberately approximate. The deep pass never fails
//! outward; degenerate input degrades through rule-based extraction, then
//! simple pattern matching, then a minimal-but-valid result.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::SentimentScorer;

/// Internal faults that push the deep pass into the fallback chain. Never
/// surfaced to callers.
#[derive(Debug, Error)]
enum DeepAnalysisError {
    /// Story is empty after trimming.
    #[error("story is empty after trimming")]
    EmptyStory,

    /// Scene extraction needs at least two sentences.
    #[error("not enough sentence boundaries for scene extraction")]
    SingleSentence,
}

// ============================================================================
// Lexicon
// ============================================================================

/// Keyword tables for every extraction phase, fixed at construction.
#[derive(Debug, Clone)]
pub struct AnalysisLexicon {
    /// Family and occupation words treated as characters.
    pub role_words: Vec<String>,
    /// Pronouns promoted to implicit characters when frequent.
    pub pronoun_words: Vec<String>,
    pub object_words: Vec<String>,
    pub concept_words: Vec<String>,
    /// Place words recognized by the location phase.
    pub location_words: Vec<String>,
    /// Narrower place list used when sketching scenes.
    pub scene_location_words: Vec<String>,
    pub time_words: Vec<String>,
    /// Attribution verbs used to guess who is speaking.
    pub speaker_verbs: Vec<String>,
    /// Ordered emotional-tone labels with their trigger words.
    pub tone_cues: Vec<(String, Vec<String>)>,
    /// Ordered theme labels; a theme needs two keyword hits to register.
    pub theme_table: Vec<(String, Vec<String>)>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for AnalysisLexicon {
    fn default() -> Self {
        Self {
            role_words: words(&[
                "mom", "mother", "dad", "father", "sister", "brother", "friend", "teacher",
                "doctor", "captain", "professor",
            ]),
            pronoun_words: words(&["i", "we", "he", "she", "they"]),
            object_words: words(&["car", "house", "phone", "door", "window", "table", "chair"]),
            concept_words: words(&["dream", "fear", "love", "hope", "anger", "joy"]),
            location_words: words(&[
                "school", "home", "house", "office", "park", "store", "street", "car", "room",
                "kitchen", "bedroom", "city", "town", "forest", "beach", "mountain", "river",
                "restaurant", "cafe", "hospital",
            ]),
            scene_location_words: words(&["school", "home", "park", "office", "store", "car"]),
            time_words: words(&[
                "morning", "afternoon", "evening", "night", "today", "yesterday",
            ]),
            speaker_verbs: words(&["said", "asked", "replied", "exclaimed", "whispered"]),
            tone_cues: vec![
                ("joyful".to_string(), words(&["happy", "joy"])),
                ("melancholic".to_string(), words(&["sad", "cry"])),
                ("angry".to_string(), words(&["angry", "mad"])),
                ("tense".to_string(), words(&["scared", "fear"])),
                ("humorous".to_string(), words(&["haha", "funny"])),
            ],
            theme_table: vec![
                (
                    "Dreams & Reality".to_string(),
                    words(&["dream", "nightmare", "real", "imagine", "woke"]),
                ),
                (
                    "Family".to_string(),
                    words(&["mom", "mother", "dad", "father", "family", "parent"]),
                ),
                (
                    "Fear & Anxiety".to_string(),
                    words(&["scared", "afraid", "nervous", "worry", "fear", "panic"]),
                ),
                (
                    "Love & Relationships".to_string(),
                    words(&["love", "heart", "romance", "kiss", "together"]),
                ),
                (
                    "Adventure".to_string(),
                    words(&["journey", "explore", "discover", "travel", "quest"]),
                ),
                (
                    "Coming of Age".to_string(),
                    words(&["grow", "learn", "change", "become", "realize"]),
                ),
                (
                    "Loss & Grief".to_string(),
                    words(&["lost", "miss", "gone", "death", "remember"]),
                ),
                (
                    "Identity".to_string(),
                    words(&["who am i", "myself", "identity", "belong"]),
                ),
                (
                    "Friendship".to_string(),
                    words(&["friend", "buddy", "pal", "together"]),
                ),
                (
                    "Courage".to_string(),
                    words(&["brave", "courage", "fight", "stand", "strong"]),
                ),
            ],
        }
    }
}

// ============================================================================
// Extraction Types
// ============================================================================

/// Shape of the story text itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryStructure {
    pub paragraph_count: usize,
    pub sentence_count: usize,
    pub word_count: usize,
    pub average_sentence_words: f64,
    pub kind: StructureKind,
    pub has_dialogue: bool,
    pub has_sections: bool,
    /// Words per paragraph.
    pub text_density: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureKind {
    Vignette,
    Standard,
    Detailed,
    LongForm,
}

impl StructureKind {
    pub fn name(&self) -> &'static str {
        match self {
            StructureKind::Vignette => "vignette",
            StructureKind::Standard => "standard",
            StructureKind::Detailed => "detailed",
            StructureKind::LongForm => "long-form",
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Object,
    Concept,
}

/// A named thing the extractor noticed, with how often and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    pub mentions: usize,
    /// Character offset of the first mention.
    pub first_appearance: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityCollection {
    pub characters: Vec<Entity>,
    pub objects: Vec<Entity>,
    pub concepts: Vec<Entity>,
}

impl EntityCollection {
    pub fn len(&self) -> usize {
        self.characters.len() + self.objects.len() + self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Interior,
    Exterior,
    Public,
    Vehicle,
    Unspecified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationMention {
    pub name: String,
    pub kind: LocationKind,
    /// Character offset of the first mention.
    pub first_mention: usize,
    pub context: String,
}

/// One narrative scene, sketched from a paragraph or a sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSketch {
    pub number: usize,
    pub description: String,
    pub characters: Vec<String>,
    pub location: Option<String>,
    pub time_marker: Option<String>,
    pub emotional_tone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: String,
    pub line: String,
}

/// One point on the emotional curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalBeat {
    /// Normalized position in [0, 1].
    pub position: f64,
    pub intensity: f64,
    /// Sentiment valence in [-1, 1].
    pub valence: f64,
    pub dominant_emotion: String,
}

/// Intermediate extraction product, independently useful for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryBreakdown {
    pub structure: StoryStructure,
    pub entities: EntityCollection,
    pub locations: Vec<LocationMention>,
    pub scenes: Vec<SceneSketch>,
    pub dialogue: Vec<DialogueLine>,
}

// ============================================================================
// Analysis Output
// ============================================================================

/// Final narrative summary of a story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryAnalysis {
    pub narrative_arc: String,
    pub emotional_curve: Vec<f64>,
    /// Character name to a short development note.
    pub character_development: HashMap<String, String>,
    pub themes: Vec<String>,
    pub genre: String,
    pub target_audience: String,
    pub estimated_duration_secs: f64,
    pub complexity_score: f64,
}

/// Which strategy produced the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Deep,
    RuleBased,
    Minimal,
}

impl ExtractionMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractionMethod::Deep => "deep",
            ExtractionMethod::RuleBased => "rule_based",
            ExtractionMethod::Minimal => "minimal",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub analysis: StoryAnalysis,
    pub extraction_method: ExtractionMethod,
    pub confidence: f64,
}

// ============================================================================
// Engine
// ============================================================================

/// The story analysis engine.
pub struct AnalysisEngine {
    sentiment: Arc<dyn SentimentScorer>,
    lexicon: AnalysisLexicon,
}

impl AnalysisEngine {
    pub fn new(sentiment: Arc<dyn SentimentScorer>) -> Self {
        Self {
            sentiment,
            lexicon: AnalysisLexicon::default(),
        }
    }

    pub fn with_lexicon(sentiment: Arc<dyn SentimentScorer>, lexicon: AnalysisLexicon) -> Self {
        Self { sentiment, lexicon }
    }

    /// Analyze a story. Always returns a result; the extraction method on
    /// the output says how much of the deep pass survived.
    pub fn analyze(&self, story: &str) -> AnalysisOutput {
        match self.deep_analysis(story) {
            Ok(analysis) => {
                tracing::info!(
                    characters = analysis.character_development.len(),
                    themes = analysis.themes.len(),
                    complexity = analysis.complexity_score,
                    "Deep story analysis complete"
                );
                AnalysisOutput {
                    analysis,
                    extraction_method: ExtractionMethod::Deep,
                    confidence: 0.95,
                }
            }
            Err(fault) => {
                tracing::warn!(error = %fault, "Deep analysis unavailable, degrading to rule-based extraction");
                self.fallback_chain(story)
            }
        }
    }

    /// Run the extraction phases without the summary layer.
    pub fn breakdown(&self, story: &str) -> StoryBreakdown {
        let structure = self.analyze_structure(story);
        let entities = self.extract_entities(story);
        let locations = self.extract_locations(story);
        let scenes = self.extract_scenes(story, &entities);
        let dialogue = self.extract_dialogue(story);

        StoryBreakdown {
            structure,
            entities,
            locations,
            scenes,
            dialogue,
        }
    }

    fn deep_analysis(&self, story: &str) -> Result<StoryAnalysis, DeepAnalysisError> {
        if story.trim().is_empty() {
            return Err(DeepAnalysisError::EmptyStory);
        }

        let breakdown = self.breakdown(story);
        if breakdown.structure.sentence_count < 2 {
            return Err(DeepAnalysisError::SingleSentence);
        }

        let themes = self.extract_themes(story, &breakdown.entities);
        let beats = self.build_emotional_arc(&breakdown.scenes);
        let confidence = extraction_confidence(&breakdown);

        let mut character_development: HashMap<String, String> = breakdown
            .entities
            .characters
            .iter()
            .map(|e| (e.name.clone(), "Character".to_string()))
            .collect();
        if character_development.is_empty() {
            character_development.insert("Unknown Character".to_string(), "Character".to_string());
        }

        Ok(StoryAnalysis {
            narrative_arc: describe_arc(&beats),
            emotional_curve: beats.iter().map(|b| b.intensity).collect(),
            character_development,
            themes,
            genre: "Drama".to_string(),
            target_audience: "General".to_string(),
            estimated_duration_secs: story.chars().count() as f64 / 100.0,
            complexity_score: confidence,
        })
    }

    // ========================================================================
    // Fallback Chain
    // ========================================================================

    fn fallback_chain(&self, story: &str) -> AnalysisOutput {
        let entities = self.extract_entities(story);
        if !entities.characters.is_empty() {
            let names: Vec<String> = entities.characters.iter().map(|e| e.name.clone()).collect();
            return AnalysisOutput {
                analysis: basic_analysis(&names),
                extraction_method: ExtractionMethod::RuleBased,
                confidence: 0.6,
            };
        }

        tracing::warn!("Rule-based extraction found no characters, trying simple patterns");
        let names = self.simple_pattern_names(story);
        if !names.is_empty() {
            return AnalysisOutput {
                analysis: basic_analysis(&names),
                extraction_method: ExtractionMethod::RuleBased,
                confidence: 0.6,
            };
        }

        tracing::warn!("No recognizable patterns, returning minimal analysis");
        AnalysisOutput {
            analysis: minimal_analysis(),
            extraction_method: ExtractionMethod::Minimal,
            confidence: 0.3,
        }
    }

    fn simple_pattern_names(&self, story: &str) -> Vec<String> {
        let lowered = story.to_lowercase();
        let mut names = Vec::new();
        if lowered.contains("mom") {
            names.push("Mom".to_string());
        }
        if lowered.contains("dad") {
            names.push("Dad".to_string());
        }
        if lowered.contains("i ") || lowered.starts_with("i ") {
            names.push("Narrator".to_string());
        }
        names
    }

    // ========================================================================
    // Phase 1: Structure
    // ========================================================================

    fn analyze_structure(&self, story: &str) -> StoryStructure {
        let paragraphs: Vec<&str> = story
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let sentences: Vec<&str> = story
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let word_count = story.split_whitespace().count();

        let average_paragraph_chars = if paragraphs.is_empty() {
            0
        } else {
            paragraphs.iter().map(|p| p.chars().count()).sum::<usize>() / paragraphs.len()
        };

        let kind = if average_paragraph_chars > 500 {
            StructureKind::LongForm
        } else if paragraphs.len() <= 2 {
            StructureKind::Vignette
        } else if sentences.len() > paragraphs.len() * 10 {
            StructureKind::Detailed
        } else {
            StructureKind::Standard
        };

        StoryStructure {
            paragraph_count: paragraphs.len(),
            sentence_count: sentences.len(),
            word_count,
            average_sentence_words: if sentences.is_empty() {
                0.0
            } else {
                word_count as f64 / sentences.len() as f64
            },
            kind,
            has_dialogue: story.contains('"'),
            has_sections: paragraphs.len() >= 3,
            text_density: word_count as f64 / paragraphs.len().max(1) as f64,
        }
    }

    // ========================================================================
    // Phase 2: Entities
    // ========================================================================

    fn extract_entities(&self, story: &str) -> EntityCollection {
        let lowered = story.to_lowercase();
        let mut characters: Vec<Entity> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        // Capitalized words are taken as proper nouns. Sorted for a
        // deterministic order.
        let mut proper: BTreeSet<String> = BTreeSet::new();
        for word in story.split_whitespace() {
            let Some(first) = word.chars().next() else {
                continue;
            };
            if !first.is_uppercase() || word.chars().count() <= 1 {
                continue;
            }
            if !word.chars().all(|c| c.is_alphabetic() || c == '\'') {
                continue;
            }
            proper.insert(capitalize(&word.to_lowercase()));
        }
        for name in proper {
            let key = name.to_lowercase();
            let mentions = lowered.matches(key.as_str()).count();
            if mentions > 0 && seen.insert(name.clone()) {
                characters.push(Entity {
                    first_appearance: first_occurrence(&lowered, &key),
                    name,
                    kind: EntityKind::Character,
                    mentions,
                });
            }
        }

        for role in &self.lexicon.role_words {
            if !lowered.contains(role.as_str()) {
                continue;
            }
            let name = capitalize(role);
            if seen.insert(name.clone()) {
                characters.push(Entity {
                    name,
                    kind: EntityKind::Character,
                    mentions: lowered.matches(role.as_str()).count(),
                    first_appearance: first_occurrence(&lowered, role),
                });
            }
        }

        // Frequent pronouns become implicit characters.
        for pronoun in &self.lexicon.pronoun_words {
            let count = count_word(&lowered, pronoun);
            if count <= 2 {
                continue;
            }
            let name = if pronoun == "i" {
                "Narrator".to_string()
            } else {
                format!("{} (implicit)", pronoun)
            };
            if seen.insert(name.clone()) {
                characters.push(Entity {
                    name,
                    kind: EntityKind::Character,
                    mentions: count,
                    first_appearance: 0,
                });
            }
        }

        EntityCollection {
            characters,
            objects: keyword_entities(&lowered, &self.lexicon.object_words, EntityKind::Object),
            concepts: keyword_entities(&lowered, &self.lexicon.concept_words, EntityKind::Concept),
        }
    }

    // ========================================================================
    // Phase 3: Locations
    // ========================================================================

    fn extract_locations(&self, story: &str) -> Vec<LocationMention> {
        let lowered = story.to_lowercase();
        let mut locations: Vec<LocationMention> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for keyword in &self.lexicon.location_words {
            if !lowered.contains(keyword.as_str()) {
                continue;
            }
            let name = capitalize(keyword);
            if !seen.insert(name.clone()) {
                continue;
            }
            locations.push(LocationMention {
                name,
                kind: categorize_location(keyword),
                first_mention: first_occurrence(&lowered, keyword),
                context: surrounding_context(story, &lowered, keyword),
            });
        }

        // Words after place prepositions are candidate locations too.
        for pattern in ["at the", "in the", "on the", "near the"] {
            let Some(byte) = lowered.find(pattern) else {
                continue;
            };
            let Some(word) = lowered[byte + pattern.len()..].split_whitespace().next() else {
                continue;
            };
            if word.chars().count() <= 2 {
                continue;
            }
            let name = capitalize(word);
            if seen.insert(name.clone()) {
                locations.push(LocationMention {
                    name,
                    kind: LocationKind::Unspecified,
                    first_mention: lowered[..byte].chars().count(),
                    context: format!("Mentioned with '{}'", pattern),
                });
            }
        }

        if locations.is_empty() {
            locations.push(LocationMention {
                name: "Unspecified Location".to_string(),
                kind: LocationKind::Unspecified,
                first_mention: 0,
                context: "Location not explicitly stated".to_string(),
            });
        }
        locations
    }

    // ========================================================================
    // Phase 4: Scenes
    // ========================================================================

    fn extract_scenes(&self, story: &str, entities: &EntityCollection) -> Vec<SceneSketch> {
        let paragraphs: Vec<&str> = story
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let mut scenes: Vec<SceneSketch> = Vec::new();

        if paragraphs.len() >= 2 {
            for (index, paragraph) in paragraphs.iter().enumerate() {
                let lowered = paragraph.to_lowercase();
                let preview: String = paragraph.chars().take(100).collect();
                let description = if paragraph.chars().count() > 100 {
                    format!("{}...", preview)
                } else {
                    preview
                };
                let characters = entities
                    .characters
                    .iter()
                    .filter(|e| lowered.contains(&e.name.to_lowercase()))
                    .map(|e| e.name.clone())
                    .collect();

                scenes.push(SceneSketch {
                    number: index + 1,
                    description,
                    characters,
                    location: self.infer_location(&lowered),
                    time_marker: self.infer_time_marker(&lowered),
                    emotional_tone: self.infer_emotional_tone(&lowered),
                });
            }
        } else {
            // Short stories break into sentence scenes, capped at ten.
            let sentences: Vec<&str> = story
                .split(['.', '!', '?'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            for (index, sentence) in sentences.iter().take(10).enumerate() {
                scenes.push(SceneSketch {
                    number: index + 1,
                    description: sentence.to_string(),
                    characters: Vec::new(),
                    location: None,
                    time_marker: None,
                    emotional_tone: self.infer_emotional_tone(&sentence.to_lowercase()),
                });
            }
        }

        if scenes.is_empty() {
            scenes.push(SceneSketch {
                number: 1,
                description: "Single scene narrative".to_string(),
                characters: entities.characters.iter().map(|e| e.name.clone()).collect(),
                location: None,
                time_marker: None,
                emotional_tone: "neutral".to_string(),
            });
        }
        scenes
    }

    fn infer_location(&self, lowered: &str) -> Option<String> {
        self.lexicon
            .scene_location_words
            .iter()
            .find(|w| lowered.contains(w.as_str()))
            .map(|w| capitalize(w))
    }

    fn infer_time_marker(&self, lowered: &str) -> Option<String> {
        self.lexicon
            .time_words
            .iter()
            .find(|w| lowered.contains(w.as_str()))
            .cloned()
    }

    fn infer_emotional_tone(&self, lowered: &str) -> String {
        for (tone, cues) in &self.lexicon.tone_cues {
            if cues.iter().any(|c| lowered.contains(c.as_str())) {
                return tone.clone();
            }
        }
        if lowered.contains('!') {
            return "excited".to_string();
        }
        "neutral".to_string()
    }

    // ========================================================================
    // Phase 5: Dialogue
    // ========================================================================

    fn extract_dialogue(&self, story: &str) -> Vec<DialogueLine> {
        let chars: Vec<char> = story.chars().collect();
        let mut dialogue = Vec::new();
        let mut open: Option<usize> = None;

        for (index, c) in chars.iter().enumerate() {
            if *c != '"' {
                continue;
            }
            match open.take() {
                None => open = Some(index),
                Some(start) => {
                    let line: String = chars[start + 1..index].iter().collect();
                    if !line.is_empty() {
                        let speaker = self.infer_speaker(&chars, start);
                        dialogue.push(DialogueLine { speaker, line });
                    }
                }
            }
        }
        dialogue
    }

    /// Guess the speaker from the 50 characters before the opening quote.
    fn infer_speaker(&self, chars: &[char], quote_start: usize) -> String {
        let from = quote_start.saturating_sub(50);
        let context: String = chars[from..quote_start].iter().collect();
        let lowered = context.to_lowercase();

        for verb in &self.lexicon.speaker_verbs {
            if !lowered.contains(verb.as_str()) {
                continue;
            }
            let context_words: Vec<&str> = context.split_whitespace().collect();
            if let Some(pos) = context_words
                .iter()
                .position(|w| w.to_lowercase().contains(verb.as_str()))
            {
                if pos > 0 {
                    return context_words[pos - 1].to_string();
                }
            }
        }
        "Unknown Speaker".to_string()
    }

    // ========================================================================
    // Phase 6: Themes
    // ========================================================================

    fn extract_themes(&self, story: &str, entities: &EntityCollection) -> Vec<String> {
        let lowered = story.to_lowercase();
        let mut themes: Vec<String> = Vec::new();

        for (theme, keywords) in &self.lexicon.theme_table {
            let hits = keywords.iter().filter(|k| lowered.contains(k.as_str())).count();
            if hits >= 2 {
                themes.push(theme.clone());
            }
        }

        if entities
            .concepts
            .iter()
            .any(|c| c.name.to_lowercase().contains("dream"))
        {
            let extra = "Dreams & Reality".to_string();
            if !themes.contains(&extra) {
                themes.push(extra);
            }
        }

        if themes.is_empty() {
            themes.push("Personal Narrative".to_string());
        }
        themes.sort();
        themes
    }

    // ========================================================================
    // Phase 7: Emotional Arc
    // ========================================================================

    fn build_emotional_arc(&self, scenes: &[SceneSketch]) -> Vec<EmotionalBeat> {
        let total = scenes.len();
        scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| EmotionalBeat {
                position: index as f64 / total.saturating_sub(1).max(1) as f64,
                intensity: emotional_intensity(&scene.description),
                valence: self.sentiment.score_sentiment(&scene.description),
                dominant_emotion: scene.emotional_tone.clone(),
            })
            .collect()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn basic_analysis(names: &[String]) -> StoryAnalysis {
    StoryAnalysis {
        narrative_arc: "Basic narrative".to_string(),
        emotional_curve: vec![0.5; 5],
        character_development: names
            .iter()
            .map(|n| (n.clone(), "Basic character".to_string()))
            .collect(),
        themes: vec!["General Narrative".to_string()],
        genre: "Drama".to_string(),
        target_audience: "General".to_string(),
        estimated_duration_secs: 120.0,
        complexity_score: 0.6,
    }
}

fn minimal_analysis() -> StoryAnalysis {
    StoryAnalysis {
        narrative_arc: "Minimal narrative".to_string(),
        emotional_curve: vec![0.3; 3],
        character_development: HashMap::from([(
            "Character".to_string(),
            "Basic character".to_string(),
        )]),
        themes: vec!["Narrative".to_string()],
        genre: "General".to_string(),
        target_audience: "General".to_string(),
        estimated_duration_secs: 60.0,
        complexity_score: 0.3,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Character offset of the first occurrence of `term`, 0 when absent.
fn first_occurrence(lowered: &str, term: &str) -> usize {
    lowered
        .find(term)
        .map(|byte| lowered[..byte].chars().count())
        .unwrap_or(0)
}

/// Count whole-word occurrences. Both arguments must already be lowercase.
fn count_word(text: &str, word: &str) -> usize {
    text.match_indices(word)
        .filter(|(index, _)| {
            let before_ok = *index == 0
                || !text[..*index]
                    .chars()
                    .next_back()
                    .map_or(false, char::is_alphanumeric);
            let after = index + word.len();
            let after_ok = after >= text.len()
                || !text[after..].chars().next().map_or(false, char::is_alphanumeric);
            before_ok && after_ok
        })
        .count()
}

fn keyword_entities(lowered: &str, keywords: &[String], kind: EntityKind) -> Vec<Entity> {
    keywords
        .iter()
        .filter(|k| lowered.contains(k.as_str()))
        .map(|k| Entity {
            name: capitalize(k),
            kind,
            mentions: lowered.matches(k.as_str()).count(),
            first_appearance: first_occurrence(lowered, k),
        })
        .collect()
}

fn categorize_location(keyword: &str) -> LocationKind {
    match keyword {
        "home" | "house" | "room" | "kitchen" | "bedroom" => LocationKind::Interior,
        "street" | "park" | "forest" | "beach" | "mountain" => LocationKind::Exterior,
        "school" | "office" | "store" | "restaurant" | "hospital" => LocationKind::Public,
        "car" => LocationKind::Vehicle,
        _ => LocationKind::Unspecified,
    }
}

/// Twenty characters of context either side of the first match.
fn surrounding_context(story: &str, lowered: &str, term: &str) -> String {
    match lowered.find(term) {
        Some(byte) => {
            let start_char = lowered[..byte].chars().count();
            let from = start_char.saturating_sub(20);
            let take = start_char - from + term.chars().count() + 20;
            story.chars().skip(from).take(take).collect()
        }
        None => term.to_string(),
    }
}

/// Punctuation density plus shouted words, capped at 1.0.
fn emotional_intensity(text: &str) -> f64 {
    let markers = text.chars().filter(|c| *c == '!' || *c == '?').count();
    let shouted = text
        .split_whitespace()
        .filter(|w| w.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()))
        .count();
    ((markers + shouted) as f64 / 10.0).min(1.0)
}

fn extraction_confidence(breakdown: &StoryBreakdown) -> f64 {
    let mut score: f64 = 0.0;
    if breakdown.structure.paragraph_count > 2 {
        score += 0.2;
    }
    if breakdown.structure.word_count > 100 {
        score += 0.2;
    }
    if breakdown.structure.has_dialogue {
        score += 0.1;
    }
    if !breakdown.entities.characters.is_empty() {
        score += 0.2;
    }
    if breakdown.entities.characters.len() > 2 {
        score += 0.1;
    }
    if breakdown.scenes.len() > 1 {
        score += 0.2;
    }
    score.min(1.0)
}

fn describe_arc(beats: &[EmotionalBeat]) -> String {
    if beats.is_empty() {
        return "flat".to_string();
    }
    let count = beats.len() as f64;
    let avg_valence = beats.iter().map(|b| b.valence).sum::<f64>() / count;
    let avg_intensity = beats.iter().map(|b| b.intensity).sum::<f64>() / count;

    let label = if avg_valence > 0.3 && avg_intensity > 0.6 {
        "uplifting"
    } else if avg_valence < -0.3 && avg_intensity > 0.6 {
        "dark"
    } else if avg_intensity > 0.7 {
        "intense"
    } else if avg_intensity < 0.3 {
        "subdued"
    } else {
        "neutral"
    };
    format!("{} beats, {} arc", beats.len(), label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::KeywordSentiment;

    fn engine() -> AnalysisEngine {
        AnalysisEngine::new(Arc::new(KeywordSentiment::new()))
    }

    const STORY: &str = "Maria walked to the park with her dad. The morning was bright.\n\n\
        \"Do you remember the river?\" Maria asked. He smiled and said nothing.\n\n\
        They sat together by the water until night fell. She was happy.";

    #[test]
    fn test_deep_analysis_on_full_story() {
        let out = engine().analyze(STORY);

        assert_eq!(out.extraction_method, ExtractionMethod::Deep);
        assert_eq!(out.confidence, 0.95);
        assert!(out.analysis.character_development.contains_key("Maria"));
        assert!(out.analysis.character_development.contains_key("Dad"));
        assert_eq!(out.analysis.genre, "Drama");
        assert_eq!(out.analysis.emotional_curve.len(), 3);
        assert!(out.analysis.complexity_score > 0.0);
    }

    #[test]
    fn test_single_sentence_with_names_degrades_to_rule_based() {
        let out = engine().analyze("Mom waved from the porch");

        assert_eq!(out.extraction_method, ExtractionMethod::RuleBased);
        assert_eq!(out.confidence, 0.6);
        assert!(out.analysis.character_development.contains_key("Mom"));
        assert_eq!(out.analysis.emotional_curve, vec![0.5; 5]);
        assert_eq!(out.analysis.themes, vec!["General Narrative".to_string()]);
    }

    #[test]
    fn test_bare_narrator_falls_through_to_simple_patterns() {
        let out = engine().analyze("i walked and walked and kept walking");

        assert_eq!(out.extraction_method, ExtractionMethod::RuleBased);
        assert!(out.analysis.character_development.contains_key("Narrator"));
    }

    #[test]
    fn test_punctuation_only_input_yields_minimal_analysis() {
        let out = engine().analyze("!!! ??? !!!");

        assert_eq!(out.extraction_method, ExtractionMethod::Minimal);
        assert_eq!(out.confidence, 0.3);
        assert_eq!(out.analysis.themes, vec!["Narrative".to_string()]);
        assert_eq!(out.analysis.emotional_curve, vec![0.3; 3]);
        assert!(out.analysis.character_development.contains_key("Character"));
    }

    #[test]
    fn test_structure_kinds() {
        let e = engine();

        let vignette = e.analyze_structure("One short paragraph. Two sentences.");
        assert_eq!(vignette.kind, StructureKind::Vignette);
        assert!(!vignette.has_dialogue);

        let long_form = e.analyze_structure(&"word ".repeat(120));
        assert_eq!(long_form.kind, StructureKind::LongForm);

        let standard = e.analyze_structure("First paragraph here.\n\nSecond one now.\n\nThird closes it.");
        assert_eq!(standard.kind, StructureKind::Standard);
        assert!(standard.has_sections);
    }

    #[test]
    fn test_entity_extraction() {
        let story = "Maria met Maria near the old teacher. I thought I knew what I wanted. \
                     The door to the house stayed shut. A dream and a fear.";
        let entities = engine().extract_entities(story);

        let maria = entities
            .characters
            .iter()
            .find(|e| e.name == "Maria")
            .unwrap();
        assert_eq!(maria.mentions, 2);
        assert!(entities.characters.iter().any(|e| e.name == "Teacher"));
        assert!(entities.characters.iter().any(|e| e.name == "Narrator"));
        assert!(entities.objects.iter().any(|e| e.name == "Door"));
        assert!(entities.objects.iter().any(|e| e.name == "House"));
        assert!(entities.concepts.iter().any(|e| e.name == "Dream"));
        assert!(entities.concepts.iter().any(|e| e.name == "Fear"));
    }

    #[test]
    fn test_scene_extraction_from_paragraphs() {
        let breakdown = engine().breakdown(STORY);

        assert_eq!(breakdown.scenes.len(), 3);
        assert_eq!(breakdown.scenes[0].number, 1);
        assert_eq!(breakdown.scenes[0].location.as_deref(), Some("Park"));
        assert_eq!(breakdown.scenes[0].time_marker.as_deref(), Some("morning"));
        assert!(breakdown.scenes[0].characters.contains(&"Maria".to_string()));
        assert_eq!(breakdown.scenes[2].emotional_tone, "joyful");
    }

    #[test]
    fn test_long_paragraph_preview_is_truncated() {
        let long = format!("{}\n\nshort tail paragraph", "detail ".repeat(40));
        let breakdown = engine().breakdown(&long);

        assert!(breakdown.scenes[0].description.ends_with("..."));
        assert_eq!(breakdown.scenes[0].description.chars().count(), 103);
    }

    #[test]
    fn test_dialogue_speaker_inference() {
        let story = "\"Run,\" Maria said. \"Where to?\"";
        let dialogue = engine().extract_dialogue(story);

        assert_eq!(dialogue.len(), 2);
        assert_eq!(dialogue[0].line, "Run,");
        assert_eq!(dialogue[0].speaker, "Unknown Speaker");
        // Attribution looks backwards only, so the second quote picks up the
        // name before "said".
        assert_eq!(dialogue[1].line, "Where to?");
        assert_eq!(dialogue[1].speaker, "Maria");
    }

    #[test]
    fn test_theme_needs_two_keyword_hits() {
        let e = engine();

        let themes = e.extract_themes("My mom and dad waited.", &EntityCollection::default());
        assert!(themes.contains(&"Family".to_string()));

        let single = e.extract_themes("My mom waited.", &EntityCollection::default());
        assert_eq!(single, vec!["Personal Narrative".to_string()]);
    }

    #[test]
    fn test_themes_are_sorted() {
        let themes = engine().extract_themes(
            "A brave fight in a dream they could not imagine.",
            &EntityCollection::default(),
        );
        let mut sorted = themes.clone();
        sorted.sort();
        assert_eq!(themes, sorted);
        assert!(themes.contains(&"Courage".to_string()));
        assert!(themes.contains(&"Dreams & Reality".to_string()));
    }

    #[test]
    fn test_location_backstop() {
        let breakdown = engine().breakdown("Nothing places this anywhere. Nor this.");
        assert_eq!(breakdown.locations.len(), 1);
        assert_eq!(breakdown.locations[0].name, "Unspecified Location");
    }

    #[test]
    fn test_emotional_intensity_counts_marks_and_shouts() {
        assert_eq!(emotional_intensity("a quiet day."), 0.0);
        assert!((emotional_intensity("STOP right there!") - 0.2).abs() < 1e-9);
        assert_eq!(emotional_intensity("NO! NO! NO! WHY?! WHY?! WHY?!"), 1.0);
    }

    #[test]
    fn test_emotional_arc_valence_uses_scorer() {
        let scenes = vec![
            SceneSketch {
                number: 1,
                description: "They were happy together".to_string(),
                characters: vec![],
                location: None,
                time_marker: None,
                emotional_tone: "joyful".to_string(),
            },
            SceneSketch {
                number: 2,
                description: "Then came the despair".to_string(),
                characters: vec![],
                location: None,
                time_marker: None,
                emotional_tone: "melancholic".to_string(),
            },
        ];
        let beats = engine().build_emotional_arc(&scenes);

        assert_eq!(beats.len(), 2);
        assert_eq!(beats[0].position, 0.0);
        assert_eq!(beats[1].position, 1.0);
        assert!(beats[0].valence > 0.0);
        assert!(beats[1].valence < 0.0);
    }

    #[test]
    fn test_count_word_boundaries() {
        assert_eq!(count_word("i think i know i do", "i"), 3);
        assert_eq!(count_word("it is in itself", "i"), 0);
        assert_eq!(count_word("she and he and she", "she"), 2);
    }
}
