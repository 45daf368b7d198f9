//! Stage-level failure taxonomy
//!
//! Every variant is recovered inside the pipeline; none of them reaches the
//! HTTP caller.

use crate::llm::LlmError;
use std::fmt;
use thiserror::Error;

/// Result type for a single pipeline stage
pub type StageResult<T> = std::result::Result<T, StageError>;

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Search,
    Extraction,
    Persistence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Search => "search",
            Stage::Extraction => "extraction",
            Stage::Persistence => "persistence",
        })
    }
}

#[derive(Error, Debug)]
pub enum StageError {
    /// The generative-text service call failed
    #[error("{stage} stage: upstream unavailable: {source}")]
    UpstreamUnavailable { stage: Stage, source: LlmError },

    /// Extraction response is not the expected JSON shape
    #[error("malformed extraction response: {reason}")]
    MalformedExtraction { reason: String },

    /// One extracted item has no usable link
    #[error("source #{index} rejected: {reason}")]
    InvalidSource { index: usize, reason: String },

    /// Storing one source failed
    #[error("failed to persist source: {message}")]
    PersistenceFailure { message: String },
}

impl StageError {
    pub(crate) fn upstream(stage: Stage, source: LlmError) -> Self {
        StageError::UpstreamUnavailable { stage, source }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        StageError::MalformedExtraction { reason: reason.into() }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::UpstreamUnavailable { .. } => "upstream_unavailable",
            StageError::MalformedExtraction { .. } => "malformed_extraction",
            StageError::InvalidSource { .. } => "invalid_source",
            StageError::PersistenceFailure { .. } => "persistence_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_names_stage() {
        let err = StageError::upstream(Stage::Search, LlmError::EmptyContent);
        assert_eq!(
            err.to_string(),
            "search stage: upstream unavailable: response carried no content"
        );
        assert_eq!(err.kind(), "upstream_unavailable");
    }
}
