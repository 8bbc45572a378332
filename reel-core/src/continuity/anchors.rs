//! Continuity anchors: aggregated descriptive records for recurring
//! characters.
//!
//! Anchors are purely additive output. They never influence confidence
//! scoring; a packaging layer uses them to keep a character's look consistent
//! across generated clips.

use crate::segment::Segment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Every distinct segment text mentioning one character, with the mentioning
/// segment indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuityAnchor {
    pub character: String,
    pub descriptions: Vec<String>,
    pub segment_indices: Vec<usize>,
    pub created_at: DateTime<Utc>,
}

/// Collect one anchor per character name seen anywhere in the run,
/// case-insensitively, in first-appearance order. The first spelling seen is
/// kept as the display name.
pub fn collect_anchors(segments: &[Segment]) -> Vec<ContinuityAnchor> {
    let mut names: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for segment in segments {
        for name in &segment.characters {
            if seen.insert(name.to_lowercase()) {
                names.push(name.clone());
            }
        }
    }

    names
        .into_iter()
        .map(|character| {
            let needle = character.to_lowercase();
            let mut descriptions: Vec<String> = Vec::new();
            let mut segment_indices: Vec<usize> = Vec::new();
            for segment in segments {
                if mentions_name(&segment.content.to_lowercase(), &needle) {
                    segment_indices.push(segment.index);
                    if !descriptions.contains(&segment.content) {
                        descriptions.push(segment.content.clone());
                    }
                }
            }
            ContinuityAnchor {
                character,
                descriptions,
                segment_indices,
                created_at: Utc::now(),
            }
        })
        .collect()
}

/// Check whether `text` mentions `name` at word boundaries. Both arguments
/// must already be lowercased. "Tom" matches in "old tom waved" but not in
/// "tomorrow"; multi-word names match as a phrase.
fn mentions_name(text: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let bytes = text.as_bytes();
    for (start, matched) in text.match_indices(name) {
        let end = start + matched.len();
        let left_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let right_ok = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if left_ok && right_ok {
            return true;
        }
    }

    false
}
