//! Comment service.
//!
//! Creating and deleting comments keeps the parent post's `comment_count` in
//! step, and a comment on someone else's post notifies the post author in the
//! same transaction.

use std::sync::Arc;

use chrono::Utc;
use companion_common::{AppError, AppResult, IdGenerator};
use companion_db::{
    entities::{comment, notification},
    repositories::{CommentRepository, NotificationRepository, PostRepository, UserRepository},
    run_transaction,
};
use sea_orm::{DatabaseConnection, Set};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::services::event_publisher::{EventPublisherService, StoreEvent, publish_quietly};
use crate::services::identity::Identity;

/// Input for creating or editing a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

/// Message of the notification sent to a post author.
#[must_use]
pub fn comment_notification_message(post_title: &str, commenter: &str) -> String {
    format!("New comment on your post: {post_title} by {commenter}")
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    db: Arc<DatabaseConnection>,
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    notification_repo: NotificationRepository,
    user_repo: UserRepository,
    event_publisher: EventPublisherService,
    max_attempts: u32,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_publisher: EventPublisherService,
        max_attempts: u32,
    ) -> Self {
        Self {
            comment_repo: CommentRepository::new(db.clone()),
            post_repo: PostRepository::new(db.clone()),
            notification_repo: NotificationRepository::new(db.clone()),
            user_repo: UserRepository::new(db.clone()),
            db,
            event_publisher,
            max_attempts,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a comment.
    ///
    /// One transaction reads the post, writes the comment, writes a
    /// notification for the post author when the commenter is someone else,
    /// and increments `comment_count`.
    pub async fn create(
        &self,
        actor: &Identity,
        post_id: &str,
        input: CommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;

        let author = self
            .user_repo
            .find_by_id(&actor.uid)
            .await?
            .ok_or_else(|| AppError::UserNotFound(actor.uid.clone()))?;

        let comment_id = self.id_gen.generate();
        let notification_id = self.id_gen.generate();

        let (created, notified) = run_transaction(&self.db, self.max_attempts, |txn| {
            let post_repo = self.post_repo.clone();
            let comment_repo = self.comment_repo.clone();
            let notification_repo = self.notification_repo.clone();
            let post_id = post_id.to_string();
            let comment_id = comment_id.clone();
            let notification_id = notification_id.clone();
            let author_id = author.id.clone();
            let username = author.username.clone();
            let content = input.content.clone();
            Box::pin(async move {
                let post = post_repo
                    .find_by_id_tx(txn, &post_id)
                    .await?
                    .ok_or_else(|| AppError::PostNotFound(post_id.clone()))?;
                if post.is_locked {
                    return Err(AppError::Locked("Post is locked".to_string()));
                }

                let now = Utc::now();
                let created = comment_repo
                    .create_tx(
                        txn,
                        comment::ActiveModel {
                            id: Set(comment_id),
                            post_id: Set(post_id.clone()),
                            author_id: Set(author_id.clone()),
                            username: Set(username.clone()),
                            content: Set(content),
                            created_at: Set(now.into()),
                            updated_at: Set(now.into()),
                            is_locked: Set(false),
                            is_edited: Set(false),
                            is_hidden: Set(false),
                        },
                    )
                    .await?;

                let notified = if author_id == post.author_id {
                    None
                } else {
                    notification_repo
                        .create_tx(
                            txn,
                            notification::ActiveModel {
                                id: Set(notification_id),
                                user_id: Set(post.author_id.clone()),
                                notification_type: Set(notification::NotificationType::Info),
                                message: Set(comment_notification_message(&post.title, &username)),
                                date: Set(now.into()),
                                is_read: Set(false),
                            },
                        )
                        .await?;
                    Some(post.author_id.clone())
                };

                post_repo
                    .set_comment_count_tx(txn, &post_id, post.version, post.comment_count + 1)
                    .await?;

                Ok((created, notified))
            })
        })
        .await?;

        info!(
            comment_id = %created.id,
            post_id = %post_id,
            notified = notified.is_some(),
            "Comment created"
        );

        publish_quietly(
            &self.event_publisher,
            StoreEvent::CommentsChanged {
                post_id: post_id.to_string(),
            },
        )
        .await;
        publish_quietly(
            &self.event_publisher,
            StoreEvent::PostChanged {
                id: post_id.to_string(),
            },
        )
        .await;
        if let Some(user_id) = notified {
            publish_quietly(
                &self.event_publisher,
                StoreEvent::NotificationsChanged { user_id },
            )
            .await;
        }

        Ok(created)
    }

    /// Delete a comment. Comment author, post author or admin.
    ///
    /// `comment_count` is decremented in the same transaction and never goes below zero.
    pub async fn delete(&self, actor: &Identity, post_id: &str, comment_id: &str) -> AppResult<()> {
        run_transaction(&self.db, self.max_attempts, |txn| {
            let post_repo = self.post_repo.clone();
            let comment_repo = self.comment_repo.clone();
            let actor = actor.clone();
            let post_id = post_id.to_string();
            let comment_id = comment_id.to_string();
            Box::pin(async move {
                let post = post_repo
                    .find_by_id_tx(txn, &post_id)
                    .await?
                    .ok_or_else(|| AppError::PostNotFound(post_id.clone()))?;
                let comment = comment_repo
                    .find_by_id_tx(txn, &comment_id)
                    .await?
                    .filter(|c| c.post_id == post_id)
                    .ok_or_else(|| AppError::CommentNotFound(comment_id.clone()))?;

                if !(actor.is_admin || actor.uid == comment.author_id || actor.uid == post.author_id)
                {
                    return Err(AppError::Forbidden(
                        "Not allowed to delete this comment".to_string(),
                    ));
                }

                if !comment_repo.delete_tx(txn, &comment_id).await? {
                    return Err(AppError::CommentNotFound(comment_id.clone()));
                }
                post_repo
                    .set_comment_count_tx(
                        txn,
                        &post_id,
                        post.version,
                        (post.comment_count - 1).max(0),
                    )
                    .await
            })
        })
        .await?;

        info!(comment_id = %comment_id, post_id = %post_id, actor = %actor.uid, "Comment deleted");
        publish_quietly(
            &self.event_publisher,
            StoreEvent::CommentsChanged {
                post_id: post_id.to_string(),
            },
        )
        .await;
        publish_quietly(
            &self.event_publisher,
            StoreEvent::PostChanged {
                id: post_id.to_string(),
            },
        )
        .await;
        Ok(())
    }

    /// Edit a comment. Comment author only; rejected when the post or the comment is locked.
    pub async fn edit(
        &self,
        actor: &Identity,
        post_id: &str,
        comment_id: &str,
        input: CommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;

        run_transaction(&self.db, self.max_attempts, |txn| {
            let post_repo = self.post_repo.clone();
            let comment_repo = self.comment_repo.clone();
            let actor_id = actor.uid.clone();
            let post_id = post_id.to_string();
            let comment_id = comment_id.to_string();
            let content = input.content.clone();
            Box::pin(async move {
                let post = post_repo
                    .find_by_id_tx(txn, &post_id)
                    .await?
                    .ok_or_else(|| AppError::PostNotFound(post_id.clone()))?;
                let comment = comment_repo
                    .find_by_id_tx(txn, &comment_id)
                    .await?
                    .filter(|c| c.post_id == post_id)
                    .ok_or_else(|| AppError::CommentNotFound(comment_id.clone()))?;

                if comment.author_id != actor_id {
                    return Err(AppError::Forbidden(
                        "Only the author can edit a comment".to_string(),
                    ));
                }
                if post.is_locked || comment.is_locked {
                    return Err(AppError::Locked("Comment is locked".to_string()));
                }

                comment_repo.update_content_tx(txn, &comment_id, &content).await
            })
        })
        .await?;

        publish_quietly(
            &self.event_publisher,
            StoreEvent::CommentsChanged {
                post_id: post_id.to_string(),
            },
        )
        .await;

        self.comment_repo
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::CommentNotFound(comment_id.to_string()))
    }

    /// Hide or show a comment. Admin or post author.
    pub async fn set_hidden(
        &self,
        actor: &Identity,
        post_id: &str,
        comment_id: &str,
        hidden: bool,
    ) -> AppResult<()> {
        let post = self
            .post_repo
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))?;
        self.comment_repo
            .find_by_id(comment_id)
            .await?
            .filter(|c| c.post_id == post_id)
            .ok_or_else(|| AppError::CommentNotFound(comment_id.to_string()))?;

        if !(actor.is_admin || actor.uid == post.author_id) {
            return Err(AppError::Forbidden(
                "Only the post author or an admin can hide comments".to_string(),
            ));
        }

        self.comment_repo.set_hidden(comment_id, hidden).await?;
        info!(comment_id = %comment_id, hidden, "Comment visibility changed");
        publish_quietly(
            &self.event_publisher,
            StoreEvent::CommentsChanged {
                post_id: post_id.to_string(),
            },
        )
        .await;
        Ok(())
    }

    /// Comments of a post, newest first.
    pub async fn list(&self, post_id: &str) -> AppResult<Vec<comment::Model>> {
        if self.post_repo.find_by_id(post_id).await?.is_none() {
            return Err(AppError::PostNotFound(post_id.to_string()));
        }
        self.comment_repo.find_by_post(post_id).await
    }

    /// Comments written by a user, newest first.
    pub async fn by_user(&self, uid: &str) -> AppResult<Vec<comment::Model>> {
        self.comment_repo.find_by_author(uid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_message() {
        assert_eq!(
            comment_notification_message("Weekend raid", "bob"),
            "New comment on your post: Weekend raid by bob"
        );
    }
}
