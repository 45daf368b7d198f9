//! Search request entity: one accepted topic submission

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "search_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Trimmed topic text
    #[sea_orm(column_type = "Text")]
    pub topic: String,

    /// Set once at insert
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::source_record::Entity")]
    Sources,
}

impl Related<super::source_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sources.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
