//! Per-user like index entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_likes")]
pub struct Model {
    /// Owner uid
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    /// Liked post IDs (set of strings)
    #[sea_orm(column_type = "Json")]
    pub liked_post_ids: Json,

    #[sea_orm(default_value = 0)]
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
