//! Application user profile entity.
//!
//! The id equals the identity provider uid.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "app_user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Display name, also used for admin prefix search
    #[sea_orm(indexed)]
    pub username: String,

    pub photo_url: String,

    /// Disabled accounts are signed out on login
    #[sea_orm(default_value = false)]
    pub disabled: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
