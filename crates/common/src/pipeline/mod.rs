//! Two-stage source extraction pipeline
//!
//! - `delegate`: forced tool call + free-text call producing raw results
//! - `extractor`: JSON-mode call turning raw results into validated sources
//! - `probe`: optional URL reachability check
//! - `orchestrator`: runs the stages and persists the outcome

mod delegate;
mod error;
mod extractor;
mod orchestrator;
mod probe;
pub mod prompts;
pub mod schema;

pub use delegate::{is_search_failure, RawResults, SearchDelegate, SEARCH_ERROR_MARKER};
pub use error::{Stage, StageError, StageResult};
pub use extractor::{
    coerce_year, is_valid_link, parse_sources, ExtractedSource, ParsedSources, SourceExtractor,
    MAX_SOURCES,
};
pub use orchestrator::{LinkCheck, PipelineState, ProbePolicy, SearchPipeline, SearchRun};
pub use probe::{ContentKind, ProbeErrorKind, ProbeMetadata, ProbeOutcome, UrlProbe, PEEK_BYTES};

use crate::db::models::limits::TOPIC_MAX_CHARS;
use crate::errors::{AppError, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Minimum topic length after trimming
pub const MIN_TOPIC_CHARS: usize = 3;

/// Trim `topic` and check its length
pub fn validate_topic(topic: &str) -> Result<&str> {
    let trimmed = topic.trim();
    let len = trimmed.chars().count();

    if len < MIN_TOPIC_CHARS {
        return Err(AppError::Validation {
            message: format!(
                "O termo de pesquisa deve ter pelo menos {} caracteres.",
                MIN_TOPIC_CHARS
            ),
            field: Some("termo".to_string()),
        });
    }
    if len > TOPIC_MAX_CHARS {
        return Err(AppError::Validation {
            message: format!(
                "O termo de pesquisa deve ter no máximo {} caracteres.",
                TOPIC_MAX_CHARS
            ),
            field: Some("termo".to_string()),
        });
    }

    Ok(trimmed)
}

/// Best-effort write of a debug artifact into `dir`
pub(crate) async fn write_debug_dump(dir: Option<&Path>, file_name: &str, contents: &str) {
    let Some(dir) = dir else {
        return;
    };

    let path = dir.join(file_name);
    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, contents).await
    }
    .await;

    match result {
        Ok(()) => debug!(path = %path.display(), "Debug dump written"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to write debug dump"),
    }
}
