//! Notification repository.

use std::sync::Arc;

use companion_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};

use super::db_err;
use crate::entities::{Notification, notification};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a notification by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<notification::Model>> {
        Notification::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Create a new notification.
    pub async fn create(
        &self,
        model: notification::ActiveModel,
    ) -> AppResult<notification::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Create a notification inside a transaction.
    pub async fn create_tx(
        &self,
        txn: &DatabaseTransaction,
        model: notification::ActiveModel,
    ) -> AppResult<notification::Model> {
        model
            .insert(txn)
            .await
            .map_err(|e| crate::map_write_err("notification", e))
    }

    /// Notifications for a user, newest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::Date)
            .order_by_desc(notification::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Count unread notifications for a user.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Mark a notification as read.
    pub async fn mark_as_read(&self, id: &str) -> AppResult<()> {
        Notification::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Mark all notifications as read for a user.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<u64> {
        let result = Notification::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected)
    }

    /// Delete one batch of read notifications atomically.
    ///
    /// Returns the number deleted; zero means nothing is left to purge.
    pub async fn purge_read_batch(&self, batch_size: u64) -> AppResult<u64> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let ids: Vec<String> = Notification::find()
            .select_only()
            .column(notification::Column::Id)
            .filter(notification::Column::IsRead.eq(true))
            .order_by_asc(notification::Column::Id)
            .limit(batch_size)
            .into_tuple()
            .all(&txn)
            .await
            .map_err(db_err)?;

        if ids.is_empty() {
            txn.commit().await.map_err(db_err)?;
            return Ok(0);
        }

        let result = Notification::delete_many()
            .filter(notification::Column::Id.is_in(ids))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::notification::NotificationType;
    use crate::test_utils::TestDatabase;
    use chrono::{Duration, Utc};
    use sea_orm::Set;

    fn new_notification(id: &str, user_id: &str, is_read: bool, age_mins: i64) -> notification::ActiveModel {
        notification::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set(user_id.to_string()),
            notification_type: Set(NotificationType::Info),
            message: Set(format!("message {id}")),
            date: Set((Utc::now() - Duration::minutes(age_mins)).into()),
            is_read: Set(is_read),
        }
    }

    #[tokio::test]
    async fn test_listing_and_unread_count() {
        let db = TestDatabase::new().await.unwrap();
        let repo = NotificationRepository::new(db.shared());

        repo.create(new_notification("n1", "u1", false, 10)).await.unwrap();
        repo.create(new_notification("n2", "u1", true, 5)).await.unwrap();
        repo.create(new_notification("n3", "u2", false, 1)).await.unwrap();

        let list = repo.find_by_user("u1").await.unwrap();
        let ids: Vec<_> = list.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["n2", "n1"]);
        assert_eq!(repo.count_unread("u1").await.unwrap(), 1);

        assert_eq!(repo.mark_all_as_read("u1").await.unwrap(), 1);
        assert_eq!(repo.count_unread("u1").await.unwrap(), 0);
        assert_eq!(repo.count_unread("u2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_read_batches() {
        let db = TestDatabase::new().await.unwrap();
        let repo = NotificationRepository::new(db.shared());

        for i in 0..5 {
            repo.create(new_notification(&format!("r{i}"), "u1", true, i))
                .await
                .unwrap();
        }
        repo.create(new_notification("unread", "u1", false, 0)).await.unwrap();

        assert_eq!(repo.purge_read_batch(2).await.unwrap(), 2);
        assert_eq!(repo.purge_read_batch(2).await.unwrap(), 2);
        assert_eq!(repo.purge_read_batch(2).await.unwrap(), 1);
        assert_eq!(repo.purge_read_batch(2).await.unwrap(), 0);

        let remaining = repo.find_by_user("u1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "unread");
    }
}
