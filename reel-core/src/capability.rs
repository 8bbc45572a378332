//! External collaborator interfaces.
//!
//! Text generation and sentiment scoring are opaque backends behind traits,
//! injected into the engines that need them. No networking lives in this
//! crate; callers supply real clients, tests supply scripted mocks.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from external collaborators.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// Backend is not configured or not reachable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Backend accepted the request but could not complete it.
    #[error("backend request failed: {0}")]
    RequestFailed(String),
}

/// Result type for capability calls.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;

// ============================================================================
// Text Generation
// ============================================================================

/// Opaque text-generation backend.
#[async_trait]
pub trait TextGeneration: Send + Sync {
    /// Whether the backend is configured and reachable.
    fn is_available(&self) -> bool;

    /// Run a prompt through the backend, with an optional system prompt.
    async fn process_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> CapabilityResult<String>;

    /// Rewrite `text` under a style-specific system prompt.
    async fn reword_text(&self, text: &str, style_prompt: &str) -> CapabilityResult<String> {
        let prompt = format!("Rewrite the following text:\n\n{}", text);
        self.process_text(&prompt, Some(style_prompt)).await
    }
}

// ============================================================================
// Sentiment
// ============================================================================

/// Sentiment scorer over short text. Pure: the same text always scores the
/// same value, in [-1, 1].
pub trait SentimentScorer: Send + Sync {
    fn score_sentiment(&self, text: &str) -> f64;
}

lazy_static::lazy_static! {
    /// Valence lexicon for the default scorer. Deliberately small and
    /// approximate; tone labels are short phrases, not prose.
    static ref VALENCE: HashMap<&'static str, f64> = {
        let mut m = HashMap::new();
        m.insert("joy", 0.9);
        m.insert("happy", 0.8);
        m.insert("triumphant", 0.8);
        m.insert("cheerful", 0.7);
        m.insert("hopeful", 0.7);
        m.insert("peaceful", 0.6);
        m.insert("serene", 0.6);
        m.insert("warm", 0.5);
        m.insert("calm", 0.4);
        m.insert("tense", -0.5);
        m.insert("melancholic", -0.5);
        m.insert("sad", -0.6);
        m.insert("angry", -0.7);
        m.insert("fear", -0.7);
        m.insert("dark", -0.7);
        m.insert("grim", -0.8);
        m.insert("scary", -0.8);
        m.insert("sinister", -0.8);
        m.insert("despair", -0.9);
        m.insert("terror", -0.9);
        m
    };
}

/// Default [`SentimentScorer`] backed by a fixed valence lexicon. Sums the
/// valence of every lexicon entry found in the lowercased text and clamps to
/// [-1, 1]. Unknown text scores 0.0.
#[derive(Debug, Clone, Default)]
pub struct KeywordSentiment;

impl KeywordSentiment {
    pub fn new() -> Self {
        Self
    }
}

impl SentimentScorer for KeywordSentiment {
    fn score_sentiment(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let score: f64 = VALENCE
            .iter()
            .filter(|(word, _)| lower.contains(*word))
            .map(|(_, valence)| valence)
            .sum();
        score.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_sentiment_polarity() {
        let scorer = KeywordSentiment::new();
        assert!(scorer.score_sentiment("Joyful") > 0.0);
        assert!(scorer.score_sentiment("grim") < 0.0);
        assert_eq!(scorer.score_sentiment("Neutral"), 0.0);
    }

    #[test]
    fn test_keyword_sentiment_clamps() {
        let scorer = KeywordSentiment::new();
        let score = scorer.score_sentiment("grim dark despair terror");
        assert_eq!(score, -1.0);
    }

    #[test]
    fn test_opposite_tones_differ_enough_for_whiplash() {
        let scorer = KeywordSentiment::new();
        let delta = (scorer.score_sentiment("Joyful") - scorer.score_sentiment("Despair")).abs();
        assert!(delta > 0.8);
    }

    #[test]
    fn test_sentiment_is_pure() {
        let scorer = KeywordSentiment::new();
        assert_eq!(
            scorer.score_sentiment("a tense night"),
            scorer.score_sentiment("a tense night")
        );
    }

    struct Echo;

    #[async_trait]
    impl TextGeneration for Echo {
        fn is_available(&self) -> bool {
            true
        }

        async fn process_text(
            &self,
            prompt: &str,
            system_prompt: Option<&str>,
        ) -> CapabilityResult<String> {
            Ok(format!("{}|{}", system_prompt.unwrap_or(""), prompt))
        }
    }

    #[tokio::test]
    async fn test_reword_text_builds_rewrite_prompt() {
        let out = Echo.reword_text("old words", "be formal").await.unwrap();
        assert_eq!(out, "be formal|Rewrite the following text:\n\nold words");
    }
}
