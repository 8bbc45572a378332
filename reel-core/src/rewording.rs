//! Style-guided text rewording.
//!
//! Seven fixed transformation styles, each carrying its own system prompt
//! for the text generation capability. The engine validates locally and
//! delegates the actual rewrite.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::{CapabilityError, TextGeneration};

/// Upper bound on reword input length, in characters.
pub const MAX_REWORD_CHARS: usize = 10_000;

/// Errors from the rewording engine.
#[derive(Debug, Error)]
pub enum RewordingError {
    /// Input text is empty after trimming.
    #[error("text is empty after trimming")]
    EmptyText,

    /// Input text exceeds the length limit.
    #[error("text exceeds {max} characters", max = MAX_REWORD_CHARS)]
    TextTooLong,

    /// The text generation capability reports itself unavailable.
    #[error("text generation capability is unavailable")]
    Unavailable,

    /// The capability accepted the request but failed to serve it.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// The fixed set of rewording transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RewordingStyle {
    ModernizeOldEnglish,
    ImproveGrammar,
    CasualTone,
    FormalTone,
    PoeticStyle,
    FasterPacing,
    CinematicMood,
}

impl RewordingStyle {
    pub const ALL: [RewordingStyle; 7] = [
        RewordingStyle::ModernizeOldEnglish,
        RewordingStyle::ImproveGrammar,
        RewordingStyle::CasualTone,
        RewordingStyle::FormalTone,
        RewordingStyle::PoeticStyle,
        RewordingStyle::FasterPacing,
        RewordingStyle::CinematicMood,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RewordingStyle::ModernizeOldEnglish => "modernize-old-english",
            RewordingStyle::ImproveGrammar => "improve-grammar",
            RewordingStyle::CasualTone => "casual-tone",
            RewordingStyle::FormalTone => "formal-tone",
            RewordingStyle::PoeticStyle => "poetic-style",
            RewordingStyle::FasterPacing => "faster-pacing",
            RewordingStyle::CinematicMood => "cinematic-mood",
        }
    }

    /// System prompt steering the capability toward this style.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            RewordingStyle::ModernizeOldEnglish => {
                "You are an expert at modernizing archaic or old English text into \
                 contemporary, natural language while preserving the original meaning \
                 and tone. Make it accessible to modern readers."
            }
            RewordingStyle::ImproveGrammar => {
                "You are a professional editor specializing in grammar improvement. \
                 Fix grammatical errors, improve sentence structure, and enhance \
                 clarity without changing the core meaning or voice."
            }
            RewordingStyle::CasualTone => {
                "You are a skilled writer who can transform text into a casual, \
                 conversational tone. Make it feel natural, approachable, and \
                 relatable while keeping the essential message intact."
            }
            RewordingStyle::FormalTone => {
                "You are an expert at transforming text into formal, professional \
                 language. Elevate the sophistication and polish while maintaining \
                 the original meaning."
            }
            RewordingStyle::PoeticStyle => {
                "You are a poet who can transform narrative text into poetic, \
                 evocative language with vivid imagery and rhythmic flow while \
                 preserving the story."
            }
            RewordingStyle::FasterPacing => {
                "You are an editor specializing in pacing. Rewrite the text to be \
                 more dynamic, urgent, and fast-paced. Use shorter sentences, active \
                 voice, and punchy language."
            }
            RewordingStyle::CinematicMood => {
                "You are a screenwriter who can transform text into cinematic prose \
                 with visual richness, atmospheric detail, and dramatic tension \
                 suitable for film."
            }
        }
    }
}

impl fmt::Display for RewordingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Output of one rewording run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewordingOutput {
    pub original: String,
    pub reworded: String,
    pub style: RewordingStyle,
}

/// The rewording engine.
pub struct RewordingEngine {
    text_generation: Arc<dyn TextGeneration>,
}

impl RewordingEngine {
    pub fn new(text_generation: Arc<dyn TextGeneration>) -> Self {
        Self { text_generation }
    }

    /// Whether the backing text generation capability is reachable.
    pub fn is_available(&self) -> bool {
        self.text_generation.is_available()
    }

    /// Rewrite `text` in the given style.
    pub async fn reword(
        &self,
        text: &str,
        style: RewordingStyle,
    ) -> Result<RewordingOutput, RewordingError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RewordingError::EmptyText);
        }
        if trimmed.chars().count() > MAX_REWORD_CHARS {
            return Err(RewordingError::TextTooLong);
        }
        if !self.text_generation.is_available() {
            return Err(RewordingError::Unavailable);
        }

        let reworded = self
            .text_generation
            .reword_text(text, style.system_prompt())
            .await?;

        tracing::debug!(style = %style, chars = text.chars().count(), "Reworded text");

        Ok(RewordingOutput {
            original: text.to_string(),
            reworded,
            style,
        })
    }
}
