//! Article entity.
//!
//! Admin-authored news pages with a thumbnail and an ordered list of
//! text and image blocks.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    pub created_at: DateTimeWithTimeZone,

    pub thumbnail_url: String,

    /// Ordered blocks, each `{"type": "text", "text"}` or `{"type": "image", "url"}`
    #[sea_orm(column_type = "Json")]
    pub blocks: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
