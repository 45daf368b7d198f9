//! Database layer for SourceFinder
//!
//! Provides:
//! - SeaORM entity models
//! - The `SearchStore` seam used by the pipeline and the HTTP handlers
//! - A Postgres-backed repository and an in-memory store
//! - Connection pool management and migrations

mod memory;
pub mod models;
mod repository;

pub use memory::MemoryStore;
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use crate::pipeline::ExtractedSource;
use async_trait::async_trait;
use models::{SearchRequest, SourceRecord};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// A search request together with its sources, in insertion order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAggregate {
    pub search: SearchRequest,
    pub sources: Vec<SourceRecord>,
}

/// Persistence operations needed by the pipeline and the API
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Insert a new search request; the store assigns id and timestamp
    async fn create_search(&self, topic: &str) -> Result<SearchRequest>;

    /// Insert one source under `search_id`
    async fn insert_source(&self, search_id: i64, source: &ExtractedSource) -> Result<SourceRecord>;

    /// One search with its sources
    async fn find_search(&self, id: i64) -> Result<Option<SearchAggregate>>;

    /// Every search, newest first, each with its sources
    async fn list_searches(&self) -> Result<Vec<SearchAggregate>>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pub primary: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let primary = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e)
            })?;

        info!("Database connection established");

        Ok(Self { primary })
    }

    /// Apply pending migrations from `migrations/`
    pub async fn migrate(&self) -> Result<()> {
        let pool = self.primary.get_postgres_connection_pool();
        sqlx::migrate!("../../migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Get the connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }
}
