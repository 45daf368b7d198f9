//! SeaORM entity models
//!
//! Database entities for SourceFinder

mod search_request;
mod source_record;

pub use search_request::{
    Entity as SearchRequestEntity,
    Model as SearchRequest,
    ActiveModel as SearchRequestActiveModel,
    Column as SearchRequestColumn,
};

pub use source_record::{
    Entity as SourceRecordEntity,
    Model as SourceRecord,
    ActiveModel as SourceRecordActiveModel,
    Column as SourceRecordColumn,
};

/// Column limits, mirrored by the `migrations/` schema (VARCHAR lengths)
pub mod limits {
    pub const TOPIC_MAX_CHARS: usize = 255;
    pub const TITLE_MAX_CHARS: usize = 500;
    pub const AUTHORS_MAX_CHARS: usize = 500;
    pub const INSTITUTION_MAX_CHARS: usize = 255;
    pub const LINK_MAX_CHARS: usize = 1000;
    pub const ACCESS_TYPE_MAX_CHARS: usize = 100;
}
