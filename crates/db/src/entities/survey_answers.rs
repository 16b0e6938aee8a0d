//! Survey answers entity.
//!
//! One document per user holding a map of survey id to entry.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "survey_answers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    /// Survey id -> `{ completed, completedAt, responses }`
    #[sea_orm(column_type = "Json")]
    pub entries: Json,

    #[sea_orm(default_value = 0)]
    pub version: i32,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
