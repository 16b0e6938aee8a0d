//! Survey definition entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "survey_definition")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: String,

    pub created_at: DateTimeWithTimeZone,

    /// Ordered question texts (array of strings)
    #[sea_orm(column_type = "Json")]
    pub questions: Json,

    /// Hidden surveys are not offered and reject submissions
    #[sea_orm(default_value = false)]
    pub is_hidden: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
