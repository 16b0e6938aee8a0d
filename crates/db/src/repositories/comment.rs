//! Comment repository.

use std::sync::Arc;

use chrono::Utc;
use companion_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, sea_query::Expr,
};

use super::db_err;
use crate::entities::{Comment, comment};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find a comment by ID inside a transaction.
    pub async fn find_by_id_tx(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
    ) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id).one(txn).await.map_err(db_err)
    }

    /// Insert a comment inside a transaction.
    pub async fn create_tx(
        &self,
        txn: &DatabaseTransaction,
        model: comment::ActiveModel,
    ) -> AppResult<comment::Model> {
        model
            .insert(txn)
            .await
            .map_err(|e| crate::map_write_err("comment", e))
    }

    /// Delete a comment. Returns whether a row was removed.
    pub async fn delete_tx(&self, txn: &DatabaseTransaction, id: &str) -> AppResult<bool> {
        let result = Comment::delete_by_id(id).exec(txn).await.map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    /// Delete every comment of a post.
    pub async fn delete_by_post_tx(
        &self,
        txn: &DatabaseTransaction,
        post_id: &str,
    ) -> AppResult<u64> {
        let result = Comment::delete_many()
            .filter(comment::Column::PostId.eq(post_id))
            .exec(txn)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }

    /// Replace the content, marking the comment edited.
    pub async fn update_content_tx(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
        content: &str,
    ) -> AppResult<()> {
        Comment::update_many()
            .col_expr(comment::Column::Content, Expr::value(content))
            .col_expr(comment::Column::IsEdited, Expr::value(true))
            .col_expr(comment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(comment::Column::Id.eq(id))
            .exec(txn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Set the moderation hidden flag.
    pub async fn set_hidden(&self, id: &str, hidden: bool) -> AppResult<()> {
        Comment::update_many()
            .col_expr(comment::Column::IsHidden, Expr::value(hidden))
            .filter(comment::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Set the lock flag.
    pub async fn set_locked(&self, id: &str, locked: bool) -> AppResult<()> {
        Comment::update_many()
            .col_expr(comment::Column::IsLocked, Expr::value(locked))
            .filter(comment::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Comments of a post, newest first.
    pub async fn find_by_post(&self, post_id: &str) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_desc(comment::Column::CreatedAt)
            .order_by_desc(comment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Comments of a post inside a transaction.
    pub async fn find_by_post_tx(
        &self,
        txn: &DatabaseTransaction,
        post_id: &str,
    ) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .all(txn)
            .await
            .map_err(db_err)
    }

    /// Comments by an author, newest first.
    pub async fn find_by_author(&self, author_id: &str) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::AuthorId.eq(author_id))
            .order_by_desc(comment::Column::CreatedAt)
            .order_by_desc(comment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
