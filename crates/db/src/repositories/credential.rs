//! Credential repository for the local identity provider.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use companion_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, SqlErr, sea_query::Expr,
};

use super::db_err;
use crate::entities::{Credential, credential};

/// Credential repository for database operations.
#[derive(Clone)]
pub struct CredentialRepository {
    db: Arc<DatabaseConnection>,
}

impl CredentialRepository {
    /// Create a new credential repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a credential by uid.
    pub async fn find_by_uid(&self, uid: &str) -> AppResult<Option<credential::Model>> {
        Credential::find_by_id(uid)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find a credential by email (case-insensitive, stored lowercase).
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<credential::Model>> {
        Credential::find()
            .filter(credential::Column::Email.eq(email.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find the credential owning a session token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<credential::Model>> {
        Credential::find()
            .filter(credential::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Create a credential inside a transaction.
    pub async fn create_tx(
        &self,
        txn: &DatabaseTransaction,
        model: credential::ActiveModel,
    ) -> AppResult<credential::Model> {
        model.insert(txn).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                AppError::Conflict("Email already registered".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Replace (or clear) the session token.
    pub async fn set_token(&self, uid: &str, token: Option<&str>) -> AppResult<()> {
        Credential::update_many()
            .col_expr(credential::Column::Token, Expr::value(token.map(str::to_string)))
            .filter(credential::Column::Uid.eq(uid))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Set the admin claim. Returns whether the credential exists.
    pub async fn set_admin(&self, uid: &str, is_admin: bool) -> AppResult<bool> {
        let result = Credential::update_many()
            .col_expr(credential::Column::IsAdmin, Expr::value(is_admin))
            .filter(credential::Column::Uid.eq(uid))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    /// Store a password reset code.
    pub async fn set_reset_code(
        &self,
        uid: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        Credential::update_many()
            .col_expr(credential::Column::ResetCode, Expr::value(code))
            .col_expr(credential::Column::ResetExpiresAt, Expr::value(expires_at))
            .filter(credential::Column::Uid.eq(uid))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Replace the password hash, clearing any reset code and session.
    pub async fn set_password(&self, uid: &str, password_hash: &str) -> AppResult<()> {
        Credential::update_many()
            .col_expr(credential::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(credential::Column::ResetCode, Expr::value(Option::<String>::None))
            .col_expr(
                credential::Column::ResetExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(credential::Column::Token, Expr::value(Option::<String>::None))
            .filter(credential::Column::Uid.eq(uid))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
