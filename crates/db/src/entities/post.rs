//! Forum post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Author uid
    #[sea_orm(indexed)]
    pub author_id: String,

    /// Author display name at creation time
    pub username: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    /// Hashtags (array of strings)
    #[sea_orm(column_type = "Json")]
    pub hashtags: Json,

    /// Number of comments (denormalized)
    #[sea_orm(default_value = 0)]
    pub comment_count: i32,

    /// Number of likes (denormalized)
    #[sea_orm(default_value = 0)]
    pub like_count: i32,

    #[sea_orm(default_value = false)]
    pub is_edited: bool,

    /// Locked posts reject comments, likes and edits
    #[sea_orm(default_value = false)]
    pub is_locked: bool,

    /// Image URLs (array of strings)
    #[sea_orm(column_type = "Json")]
    pub linked_pictures: Json,

    /// Optimistic concurrency version, bumped on every write
    #[sea_orm(default_value = 0)]
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
