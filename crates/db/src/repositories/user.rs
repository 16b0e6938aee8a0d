//! Application user repository.

use std::sync::Arc;

use companion_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

use super::db_err;
use crate::entities::{AppUser, app_user};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<app_user::Model>> {
        AppUser::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Create a user inside a transaction.
    pub async fn create_tx(
        &self,
        txn: &DatabaseTransaction,
        model: app_user::ActiveModel,
    ) -> AppResult<app_user::Model> {
        model.insert(txn).await.map_err(db_err)
    }

    /// Users whose username starts with `prefix`, ordered by username.
    pub async fn search_by_username_prefix(
        &self,
        prefix: &str,
        limit: u64,
    ) -> AppResult<Vec<app_user::Model>> {
        AppUser::find()
            .filter(app_user::Column::Username.starts_with(prefix))
            .order_by_asc(app_user::Column::Username)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Enable or disable an account. Returns whether the user exists.
    pub async fn set_disabled(&self, id: &str, disabled: bool) -> AppResult<bool> {
        let result = AppUser::update_many()
            .col_expr(app_user::Column::Disabled, Expr::value(disabled))
            .filter(app_user::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    /// Replace the profile picture URL.
    pub async fn set_photo_url(&self, id: &str, url: &str) -> AppResult<()> {
        AppUser::update_many()
            .col_expr(app_user::Column::PhotoUrl, Expr::value(url))
            .filter(app_user::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Every distinct user email address.
    pub async fn find_all_emails(&self) -> AppResult<Vec<String>> {
        AppUser::find()
            .select_only()
            .column(app_user::Column::Email)
            .distinct()
            .order_by_asc(app_user::Column::Email)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
