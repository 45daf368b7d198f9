//! Wire shapes shared by the search and history endpoints
//!
//! Field names are the ones the web front end reads.

use serde::Serialize;
use sourcefinder_common::db::models::SourceRecord;
use sourcefinder_common::SearchAggregate;

/// A search request with its sources
#[derive(Debug, Serialize)]
pub struct PesquisaResponse {
    pub id: i64,
    pub termo: String,
    /// RFC 3339 timestamp
    pub data_pesquisa: String,
    pub fontes: Vec<FonteResponse>,
}

#[derive(Debug, Serialize)]
pub struct FonteResponse {
    pub id: i64,
    pub titulo: String,
    pub autores: Option<String>,
    pub instituicao: Option<String>,
    pub ano_publicacao: Option<i32>,
    pub link: String,
    pub descricao: Option<String>,
    pub tipo_acesso: Option<String>,
}

impl From<SourceRecord> for FonteResponse {
    fn from(source: SourceRecord) -> Self {
        Self {
            id: source.id,
            titulo: source.title,
            autores: source.authors,
            instituicao: source.institution,
            ano_publicacao: source.publication_year,
            link: source.link,
            descricao: source.description,
            tipo_acesso: source.access_type,
        }
    }
}

impl From<SearchAggregate> for PesquisaResponse {
    fn from(aggregate: SearchAggregate) -> Self {
        Self {
            id: aggregate.search.id,
            termo: aggregate.search.topic,
            data_pesquisa: aggregate.search.created_at.to_rfc3339(),
            fontes: aggregate.sources.into_iter().map(FonteResponse::from).collect(),
        }
    }
}
