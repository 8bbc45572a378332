//! Pipeline error taxonomy.
//!
//! Uses thiserror for ergonomic error definition. Engine-specific errors
//! (SegmentationError, ContinuityError, ...) live next to their engines and
//! are mapped into [`PipelineError`] at the stage boundary, where the stage id
//! is known.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the orchestrator and the stage contract.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Stage validation rejected the input before execution, or the stage is
    /// disabled. Never retried. `predicate` names the check that failed.
    #[error("invalid input for stage '{stage_id}': {predicate}")]
    InvalidInput { stage_id: String, predicate: String },

    /// The deadline timer won the race against the stage's work. The caller
    /// may retry with a larger deadline; the orchestrator never retries on
    /// its own.
    #[error("stage '{stage_id}' timed out after {elapsed:?}")]
    Timeout { stage_id: String, elapsed: Duration },

    /// The stage's own work failed. The stage's internal error is carried as
    /// a rendered reason.
    #[error("stage '{stage_id}' failed: {reason}")]
    ExecutionFailed { stage_id: String, reason: String },

    /// An external collaborator (text generation, sentiment scoring) is
    /// unreachable.
    #[error("dependency unavailable: {dependency}")]
    DependencyUnavailable { dependency: String },

    /// A required storage resource is unreachable.
    #[error("resource unavailable: {resource}")]
    ResourceUnavailable { resource: String },

    /// The requested id has no registered stage.
    #[error("no stage registered under id '{stage_id}'")]
    StageNotFound { stage_id: String },
}

impl PipelineError {
    /// The id of the stage this error is attributed to, where one exists.
    pub fn stage_id(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { stage_id, .. }
            | Self::Timeout { stage_id, .. }
            | Self::ExecutionFailed { stage_id, .. }
            | Self::StageNotFound { stage_id } => Some(stage_id),
            Self::DependencyUnavailable { .. } | Self::ResourceUnavailable { .. } => None,
        }
    }

    /// True for errors a caller could reasonably retry with different limits.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::DependencyUnavailable { .. }
                | Self::ResourceUnavailable { .. }
        )
    }
}

/// Result type for orchestrator and stage operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::Timeout {
            stage_id: "segmentation".to_string(),
            elapsed: Duration::from_secs(15),
        };
        assert_eq!(err.to_string(), "stage 'segmentation' timed out after 15s");
    }

    #[test]
    fn test_invalid_input_names_predicate() {
        let err = PipelineError::InvalidInput {
            stage_id: "segmentation".to_string(),
            predicate: "text must be non-empty".to_string(),
        };
        assert!(err.to_string().contains("text must be non-empty"));
    }

    #[test]
    fn test_stage_attribution() {
        let err = PipelineError::ExecutionFailed {
            stage_id: "taxonomy".to_string(),
            reason: "no segments".to_string(),
        };
        assert_eq!(err.stage_id(), Some("taxonomy"));

        let err = PipelineError::DependencyUnavailable {
            dependency: "text generation".to_string(),
        };
        assert_eq!(err.stage_id(), None);
    }

    #[test]
    fn test_retryable_classification() {
        let timeout = PipelineError::Timeout {
            stage_id: "rewording".to_string(),
            elapsed: Duration::from_secs(15),
        };
        assert!(timeout.is_retryable());

        let invalid = PipelineError::InvalidInput {
            stage_id: "rewording".to_string(),
            predicate: "text too long".to_string(),
        };
        assert!(!invalid.is_retryable());
    }
}
