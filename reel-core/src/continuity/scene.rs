//! Scene state derivation.

use crate::segment::Segment;
use serde::{Deserialize, Serialize};

/// Lossy snapshot of a segment used only for continuity comparison against
/// the single preceding scene. Recomputed on demand; never stored alongside
/// the segment itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneState {
    pub location: String,
    pub characters: Vec<String>,
    pub props: Vec<String>,
    pub tone: String,
    /// Raw segment text at the time the snapshot was taken.
    pub text: String,
}

impl SceneState {
    /// Derive the comparison snapshot from a segment.
    pub fn from_segment(segment: &Segment) -> Self {
        Self {
            location: segment.location.clone(),
            characters: segment.characters.clone(),
            props: segment.props.clone(),
            tone: segment.tone.clone(),
            text: segment.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_segment_copies_comparison_fields() {
        let mut seg = Segment::new(1, 2.0, "The knight raised the lantern.");
        seg.location = "Crypt".to_string();
        seg.characters.push("Knight".to_string());
        seg.props.push("lantern".to_string());
        seg.tone = "tense".to_string();

        let scene = SceneState::from_segment(&seg);
        assert_eq!(scene.location, "Crypt");
        assert_eq!(scene.characters, vec!["Knight".to_string()]);
        assert_eq!(scene.props, vec!["lantern".to_string()]);
        assert_eq!(scene.tone, "tense");
        assert_eq!(scene.text, "The knight raised the lantern.");
    }
}
