//! SourceFinder Common Library
//!
//! Shared code for the SourceFinder gateway and CLI including:
//! - Database models, the `SearchStore` seam and its implementations
//! - Generative-text client abstraction
//! - The two-stage source extraction pipeline
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod pipeline;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{MemoryStore, Repository, SearchAggregate, SearchStore};
pub use errors::{AppError, Result};
pub use llm::LlmClient;
pub use pipeline::{SearchPipeline, SearchRun};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
