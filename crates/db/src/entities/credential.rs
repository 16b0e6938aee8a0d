//! Identity provider credential entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credential")]
pub struct Model {
    /// Identity uid
    #[sea_orm(primary_key, auto_increment = false)]
    pub uid: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2 hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Custom `admin` claim
    #[sea_orm(default_value = false)]
    pub is_admin: bool,

    /// Current session token; cleared on sign out
    #[sea_orm(nullable, unique)]
    #[serde(skip_serializing)]
    pub token: Option<String>,

    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub reset_code: Option<String>,

    #[sea_orm(nullable)]
    pub reset_expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
