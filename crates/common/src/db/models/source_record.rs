//! Source record entity: one extracted reference with a validated link

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "source_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub search_id: i64,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub authors: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub institution: Option<String>,

    pub publication_year: Option<i32>,

    /// Always starts with http:// or https://
    #[sea_orm(column_type = "Text")]
    pub link: String,

    /// Content/access category, e.g. "Artigo", "Vídeo"
    #[sea_orm(column_type = "Text", nullable)]
    pub access_type: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::search_request::Entity",
        from = "Column::SearchId",
        to = "super::search_request::Column::Id",
        on_delete = "Cascade"
    )]
    SearchRequest,
}

impl Related<super::search_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SearchRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
