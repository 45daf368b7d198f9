//! Postgres-backed `SearchStore`

use crate::db::models::*;
use crate::db::{DbPool, SearchAggregate, SearchStore};
use crate::errors::Result;
use crate::pipeline::ExtractedSource;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, LoaderTrait, ModelTrait, NotSet,
    QueryOrder, Set,
};

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }
}

#[async_trait]
impl SearchStore for Repository {
    async fn create_search(&self, topic: &str) -> Result<SearchRequest> {
        let search = SearchRequestActiveModel {
            id: NotSet,
            topic: Set(topic.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        search.insert(self.conn()).await.map_err(Into::into)
    }

    async fn insert_source(&self, search_id: i64, source: &ExtractedSource) -> Result<SourceRecord> {
        let record = SourceRecordActiveModel {
            id: NotSet,
            search_id: Set(search_id),
            title: Set(source.title.clone()),
            authors: Set(source.authors.clone()),
            institution: Set(source.institution.clone()),
            publication_year: Set(source.publication_year),
            link: Set(source.link.clone()),
            access_type: Set(source.access_type.clone()),
            description: Set(source.description.clone()),
        };

        record.insert(self.conn()).await.map_err(Into::into)
    }

    async fn find_search(&self, id: i64) -> Result<Option<SearchAggregate>> {
        let Some(search) = SearchRequestEntity::find_by_id(id).one(self.conn()).await? else {
            return Ok(None);
        };

        let sources = search
            .find_related(SourceRecordEntity)
            .order_by_asc(SourceRecordColumn::Id)
            .all(self.conn())
            .await?;

        Ok(Some(SearchAggregate { search, sources }))
    }

    async fn list_searches(&self) -> Result<Vec<SearchAggregate>> {
        let searches = SearchRequestEntity::find()
            .order_by_desc(SearchRequestColumn::CreatedAt)
            .order_by_desc(SearchRequestColumn::Id)
            .all(self.conn())
            .await?;

        let sources = searches.load_many(SourceRecordEntity, self.conn()).await?;

        Ok(searches
            .into_iter()
            .zip(sources)
            .map(|(search, mut sources)| {
                sources.sort_by_key(|s| s.id);
                SearchAggregate { search, sources }
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
