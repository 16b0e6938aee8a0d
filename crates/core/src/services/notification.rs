//! Notification service.

use companion_common::{AppError, AppResult, config::MAX_PURGE_BATCH_SIZE};
use companion_db::{entities::notification, repositories::NotificationRepository};
use tracing::{debug, info};

use crate::services::event_publisher::{EventPublisherService, StoreEvent, publish_quietly};

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    event_publisher: EventPublisherService,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(
        notification_repo: NotificationRepository,
        event_publisher: EventPublisherService,
    ) -> Self {
        Self {
            notification_repo,
            event_publisher,
        }
    }

    /// A user's notifications, newest first.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<notification::Model>> {
        self.notification_repo.find_by_user(user_id).await
    }

    /// Number of unread notifications.
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }

    /// Mark one notification read. Only its owner may do so.
    pub async fn mark_as_read(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        let notification = self
            .notification_repo
            .find_by_id(notification_id)
            .await?
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Notification {notification_id}")))?;

        if !notification.is_read {
            self.notification_repo.mark_as_read(notification_id).await?;
            publish_quietly(
                &self.event_publisher,
                StoreEvent::NotificationsChanged {
                    user_id: user_id.to_string(),
                },
            )
            .await;
        }
        Ok(())
    }

    /// Mark every notification of a user read. Returns how many changed.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<u64> {
        let updated = self.notification_repo.mark_all_as_read(user_id).await?;
        if updated > 0 {
            publish_quietly(
                &self.event_publisher,
                StoreEvent::NotificationsChanged {
                    user_id: user_id.to_string(),
                },
            )
            .await;
        }
        Ok(updated)
    }

    /// Delete every read notification of every user.
    ///
    /// Each batch of at most `batch_size` (capped at 500) is deleted atomically.
    pub async fn purge_read(&self, batch_size: u64) -> AppResult<u64> {
        let batch_size = batch_size.clamp(1, MAX_PURGE_BATCH_SIZE);
        let mut total = 0;

        loop {
            let deleted = self.notification_repo.purge_read_batch(batch_size).await?;
            if deleted == 0 {
                break;
            }
            total += deleted;
            debug!(deleted, total, "Purged batch of read notifications");
            if deleted < batch_size {
                break;
            }
        }

        info!(total, "Read notifications purged");
        Ok(total)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use companion_db::test_utils::TestDatabase;
    use sea_orm::Set;

    use super::*;
    use crate::services::event_publisher::NoOpEventPublisher;

    fn unread(id: &str, user_id: &str) -> notification::ActiveModel {
        notification::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set(user_id.to_string()),
            notification_type: Set(notification::NotificationType::Info),
            message: Set("hello".to_string()),
            date: Set(Utc::now().into()),
            is_read: Set(false),
        }
    }

    async fn setup() -> (TestDatabase, NotificationService, NotificationRepository) {
        let db = TestDatabase::new().await.unwrap();
        let repo = NotificationRepository::new(db.shared());
        let service = NotificationService::new(repo.clone(), Arc::new(NoOpEventPublisher));
        (db, service, repo)
    }

    #[tokio::test]
    async fn test_only_owner_can_mark_read() {
        let (_db, service, repo) = setup().await;
        repo.create(unread("n1", "alice")).await.unwrap();

        let err = service.mark_as_read("bob", "n1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(service.unread_count("alice").await.unwrap(), 1);

        service.mark_as_read("alice", "n1").await.unwrap();
        assert_eq!(service.unread_count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_removes_read_across_users_in_batches() {
        let (_db, service, repo) = setup().await;
        for i in 0..5 {
            repo.create(unread(&format!("a{i}"), "alice")).await.unwrap();
        }
        repo.create(unread("b0", "bob")).await.unwrap();
        repo.create(unread("b1", "bob")).await.unwrap();

        service.mark_all_as_read("alice").await.unwrap();
        service.mark_as_read("bob", "b0").await.unwrap();

        assert_eq!(service.purge_read(2).await.unwrap(), 6);
        assert!(service.list("alice").await.unwrap().is_empty());

        let left = service.list("bob").await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "b1");
    }
}
