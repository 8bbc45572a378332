//! Prose segmentation engine.
//!
//! Splits raw story text into ordered, duration-bounded segments. The
//! packing unit follows the detected narrative style: paragraphs for
//! conventional prose, raw lines for dialogue-heavy text, sentences for
//! stream-of-consciousness or fragmented writing. A single unit that alone
//! exceeds the ceiling is re-split word by word afterwards.

use crate::segment::{NarrativeStyle, Pacing, Segment, SegmentationMetrics, TransitionKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Narration speed backing every duration estimate.
const WORDS_PER_SECOND: f64 = 2.0;

/// Fraction of the ceiling a re-split chunk must reach before it is flushed.
const SPLIT_FILL_RATIO: f64 = 0.9;

/// Upper bound for the duration ceiling, in seconds.
pub const MAX_DURATION_CEILING: f64 = 60.0;

/// Duration ceiling used when the caller does not pick one.
pub const DEFAULT_MAX_DURATION: f64 = 4.0;

/// Errors from the segmentation engine.
#[derive(Debug, Error)]
pub enum SegmentationError {
    /// Input text is empty after trimming.
    #[error("input text is empty")]
    EmptyInput,

    /// The duration ceiling is outside (0, 60].
    #[error("duration ceiling must be in (0, {max}] seconds, got {0}", max = MAX_DURATION_CEILING)]
    InvalidDuration(f64),
}

/// Output of one segmentation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationOutput {
    pub segments: Vec<Segment>,
    pub style: NarrativeStyle,
    pub metrics: SegmentationMetrics,
}

/// Estimated narration time for `text` at 2 words per second.
pub fn estimate_duration(text: &str) -> f64 {
    text.split_whitespace().count() as f64 / WORDS_PER_SECOND
}

/// The segmentation engine. Stateless; every run re-derives structure from
/// the input text.
#[derive(Debug, Clone, Default)]
pub struct SegmentationEngine;

impl SegmentationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Split `text` into segments whose estimated durations never exceed
    /// `max_duration` seconds.
    pub fn segment_text(
        &self,
        text: &str,
        max_duration: f64,
    ) -> Result<SegmentationOutput, SegmentationError> {
        if text.trim().is_empty() {
            return Err(SegmentationError::EmptyInput);
        }
        if !(max_duration > 0.0 && max_duration <= MAX_DURATION_CEILING) {
            return Err(SegmentationError::InvalidDuration(max_duration));
        }

        let analysis = analyze_structure(text);

        let mut segments = match analysis.style {
            NarrativeStyle::Structured => pack_units(&analysis.paragraphs, "\n\n", max_duration),
            NarrativeStyle::Dialogue => {
                let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
                pack_units(&lines, "\n", max_duration)
            }
            NarrativeStyle::Stream | NarrativeStyle::Fragmented => {
                pack_units(&analysis.sentences, " ", max_duration)
            }
        };

        segments = enforce_max_duration(segments, max_duration);
        apply_pacing_metadata(&mut segments);

        let metrics = compute_metrics(&segments, max_duration);
        tracing::info!(
            segments = segments.len(),
            style = %analysis.style,
            quality = metrics.quality_score,
            "Segmentation complete"
        );

        Ok(SegmentationOutput {
            segments,
            style: analysis.style,
            metrics,
        })
    }
}

// ============================================================================
// Structure Analysis
// ============================================================================

struct StructureAnalysis {
    paragraphs: Vec<String>,
    sentences: Vec<String>,
    style: NarrativeStyle,
}

fn analyze_structure(text: &str) -> StructureAnalysis {
    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let sentences: Vec<String> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let style = detect_style(&paragraphs, &sentences);

    StructureAnalysis {
        paragraphs,
        sentences,
        style,
    }
}

/// Classify the narrative style from paragraph and sentence shape. Length
/// means are integer averages of character counts.
fn detect_style(paragraphs: &[String], sentences: &[String]) -> NarrativeStyle {
    let quoted = paragraphs.iter().filter(|p| p.contains('"')).count();

    let avg_sentence_len = if sentences.is_empty() {
        0
    } else {
        sentences.iter().map(|s| s.chars().count()).sum::<usize>() / sentences.len()
    };
    let avg_paragraph_len = if paragraphs.is_empty() {
        0
    } else {
        paragraphs.iter().map(|p| p.chars().count()).sum::<usize>() / paragraphs.len()
    };

    if quoted > 0 && quoted > paragraphs.len() / 2 {
        NarrativeStyle::Dialogue
    } else if avg_sentence_len < 30 {
        NarrativeStyle::Fragmented
    } else if avg_paragraph_len < 200 {
        NarrativeStyle::Stream
    } else {
        NarrativeStyle::Structured
    }
}

// ============================================================================
// Packing & Enforcement
// ============================================================================

/// Greedily pack whole units into segments, flushing whenever the next unit
/// would push the estimate past the ceiling. A lone unit that already
/// exceeds the ceiling still becomes a segment; enforcement re-splits it.
fn pack_units(units: &[String], separator: &str, max_duration: f64) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut current = String::new();
    let mut order = 1;

    for unit in units {
        let candidate = if current.is_empty() {
            unit.clone()
        } else {
            format!("{}{}{}", current, separator, unit)
        };

        if estimate_duration(&candidate) <= max_duration {
            current = candidate;
        } else {
            if !current.trim().is_empty() {
                segments.push(Segment::new(order, estimate_duration(&current), &current));
                order += 1;
            }
            current = unit.clone();
        }
    }

    if !current.trim().is_empty() {
        segments.push(Segment::new(order, estimate_duration(&current), &current));
    }

    segments
}

/// Re-split any segment whose estimate still exceeds the ceiling, word by
/// word. A chunk flushes once it fills 90% of the ceiling, and also right
/// before a word would push it past the ceiling, so every emitted segment
/// estimates at or under the ceiling. Indices are reassigned contiguously.
fn enforce_max_duration(segments: Vec<Segment>, max_duration: f64) -> Vec<Segment> {
    let mut result: Vec<Segment> = Vec::new();

    for segment in segments {
        if segment.target_duration_secs <= max_duration {
            result.push(segment);
            continue;
        }

        let words: Vec<&str> = segment.content.split_whitespace().collect();
        let mut chunk: Vec<&str> = Vec::new();

        for word in words {
            let with_word = (chunk.len() + 1) as f64 / WORDS_PER_SECOND;
            if !chunk.is_empty() && with_word > max_duration {
                flush_chunk(&mut result, &mut chunk);
            }

            chunk.push(word);
            let estimate = chunk.len() as f64 / WORDS_PER_SECOND;
            if estimate >= SPLIT_FILL_RATIO * max_duration {
                flush_chunk(&mut result, &mut chunk);
            }
        }

        if !chunk.is_empty() {
            flush_chunk(&mut result, &mut chunk);
        }
    }

    for (position, segment) in result.iter_mut().enumerate() {
        segment.index = position + 1;
    }

    result
}

fn flush_chunk(result: &mut Vec<Segment>, chunk: &mut Vec<&str>) {
    let content = chunk.join(" ");
    let duration = chunk.len() as f64 / WORDS_PER_SECOND;
    result.push(Segment::new(result.len() + 1, duration, content));
    chunk.clear();
}

// ============================================================================
// Pacing Metadata
// ============================================================================

fn apply_pacing_metadata(segments: &mut [Segment]) {
    let total = segments.len();
    for position in 0..total {
        segments[position].pacing = classify_pacing(&segments[position], position, total);
        segments[position].lead_transition =
            classify_transition(&segments[position], position > 0);
    }
}

fn classify_pacing(segment: &Segment, position: usize, total: usize) -> Pacing {
    let words = segment.word_count();
    if words < 20 {
        return Pacing::Fast;
    }
    if words > 60 {
        return Pacing::Slow;
    }

    let normalized = position as f64 / total.saturating_sub(1).max(1) as f64;
    if normalized > 0.3 && normalized < 0.7 {
        return Pacing::Building;
    }
    Pacing::Moderate
}

/// Classify how a segment should be entered, from cues in its first 50
/// characters.
fn classify_transition(segment: &Segment, has_previous: bool) -> TransitionKind {
    if !has_previous {
        return TransitionKind::Hard;
    }

    let prefix: String = segment
        .content
        .chars()
        .take(50)
        .collect::<String>()
        .to_lowercase();
    if prefix.contains("meanwhile") || prefix.contains("later") {
        return TransitionKind::Temporal;
    }
    if prefix.contains("at ") || prefix.contains("in the") {
        return TransitionKind::Spatial;
    }
    if segment.content.contains('"') {
        return TransitionKind::Dialogue;
    }
    TransitionKind::Cut
}

// ============================================================================
// Metrics
// ============================================================================

/// Population statistics over the emitted durations, plus two scores in
/// [0, 1]: how close the mean landed to the ceiling, and how uniform the
/// durations are.
fn compute_metrics(segments: &[Segment], target_duration: f64) -> SegmentationMetrics {
    if segments.is_empty() {
        return SegmentationMetrics::default();
    }

    let durations: Vec<f64> = segments.iter().map(|s| s.target_duration_secs).collect();
    let count = durations.len() as f64;
    let average = durations.iter().sum::<f64>() / count;
    let min = durations.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = durations.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let variance = durations
        .iter()
        .map(|d| (d - average).powi(2))
        .sum::<f64>()
        / count;
    let std_dev = variance.sqrt();

    let quality_score = (1.0 - (average - target_duration).abs() / target_duration).max(0.0);
    let boundary_quality = (1.0 - std_dev / average).max(0.0);

    SegmentationMetrics {
        average_duration: average,
        min_duration: min,
        max_duration: max,
        standard_deviation: std_dev,
        quality_score,
        boundary_quality,
        pacing_consistency: boundary_quality,
    }
}
