//! Outgoing mail repository.

use std::sync::Arc;

use companion_common::AppResult;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, TransactionTrait,
};

use super::db_err;
use crate::entities::{Mail, mail};

/// Mail queue repository.
#[derive(Clone)]
pub struct MailRepository {
    db: Arc<DatabaseConnection>,
}

impl MailRepository {
    /// Create a new mail repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Enqueue one mail.
    pub async fn enqueue(&self, model: mail::ActiveModel) -> AppResult<mail::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Enqueue several mails in one atomic batch.
    pub async fn enqueue_batch(&self, models: Vec<mail::ActiveModel>) -> AppResult<usize> {
        if models.is_empty() {
            return Ok(0);
        }
        let count = models.len();
        let txn = self.db.begin().await.map_err(db_err)?;
        Mail::insert_many(models)
            .exec(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(count)
    }

    /// Queued mails, oldest first.
    pub async fn find_all(&self) -> AppResult<Vec<mail::Model>> {
        Mail::find()
            .order_by_asc(mail::Column::CreatedAt)
            .order_by_asc(mail::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
