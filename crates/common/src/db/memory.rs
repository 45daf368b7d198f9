//! In-memory `SearchStore`
//!
//! Used by the CLI (session-scoped history) and by tests. Enforces the same
//! column limits and foreign key as the Postgres schema, so insert failures
//! behave like the real store.

use crate::db::models::{limits, SearchRequest, SourceRecord};
use crate::db::{SearchAggregate, SearchStore};
use crate::errors::{AppError, Result};
use crate::pipeline::ExtractedSource;
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    searches: Vec<SearchRequest>,
    sources: Vec<SourceRecord>,
    next_search_id: i64,
    next_source_id: i64,
}

/// Store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| AppError::Internal {
            message: "memory store lock poisoned".to_string(),
        })
    }

    fn aggregate(state: &MemoryState, search: &SearchRequest) -> SearchAggregate {
        SearchAggregate {
            search: search.clone(),
            sources: state
                .sources
                .iter()
                .filter(|s| s.search_id == search.id)
                .cloned()
                .collect(),
        }
    }
}

fn check_len(column: &str, value: Option<&str>, max: usize) -> Result<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(AppError::ConstraintViolation {
            message: format!("value too long for {} (max {} characters)", column, max),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl SearchStore for MemoryStore {
    async fn create_search(&self, topic: &str) -> Result<SearchRequest> {
        check_len("topic", Some(topic), limits::TOPIC_MAX_CHARS)?;

        let mut state = self.lock()?;
        state.next_search_id += 1;
        let search = SearchRequest {
            id: state.next_search_id,
            topic: topic.to_string(),
            created_at: chrono::Utc::now().into(),
        };
        state.searches.push(search.clone());
        Ok(search)
    }

    async fn insert_source(&self, search_id: i64, source: &ExtractedSource) -> Result<SourceRecord> {
        check_len("title", Some(&source.title), limits::TITLE_MAX_CHARS)?;
        check_len("authors", source.authors.as_deref(), limits::AUTHORS_MAX_CHARS)?;
        check_len("institution", source.institution.as_deref(), limits::INSTITUTION_MAX_CHARS)?;
        check_len("link", Some(&source.link), limits::LINK_MAX_CHARS)?;
        check_len("access_type", source.access_type.as_deref(), limits::ACCESS_TYPE_MAX_CHARS)?;

        let mut state = self.lock()?;
        if !state.searches.iter().any(|s| s.id == search_id) {
            return Err(AppError::ConstraintViolation {
                message: format!("search {} does not exist", search_id),
            });
        }

        state.next_source_id += 1;
        let record = SourceRecord {
            id: state.next_source_id,
            search_id,
            title: source.title.clone(),
            authors: source.authors.clone(),
            institution: source.institution.clone(),
            publication_year: source.publication_year,
            link: source.link.clone(),
            access_type: source.access_type.clone(),
            description: source.description.clone(),
        };
        state.sources.push(record.clone());
        Ok(record)
    }

    async fn find_search(&self, id: i64) -> Result<Option<SearchAggregate>> {
        let state = self.lock()?;
        Ok(state
            .searches
            .iter()
            .find(|s| s.id == id)
            .map(|search| Self::aggregate(&state, search)))
    }

    async fn list_searches(&self) -> Result<Vec<SearchAggregate>> {
        let state = self.lock()?;
        let mut searches: Vec<&SearchRequest> = state.searches.iter().collect();
        searches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(searches
            .into_iter()
            .map(|search| Self::aggregate(&state, search))
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}
