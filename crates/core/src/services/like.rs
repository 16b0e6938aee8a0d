//! Like service.
//!
//! A post's `like_count` and each user's like index change together inside
//! one transaction, so the count always equals the number of indexes that
//! contain the post.

use std::sync::Arc;

use companion_common::{AppError, AppResult};
use companion_db::{
    repositories::{PostRepository, UserLikesRepository},
    run_transaction,
};
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::services::event_publisher::{EventPublisherService, StoreEvent, publish_quietly};

/// Like service for business logic.
#[derive(Clone)]
pub struct LikeService {
    db: Arc<DatabaseConnection>,
    post_repo: PostRepository,
    likes_repo: UserLikesRepository,
    event_publisher: EventPublisherService,
    max_attempts: u32,
}

impl LikeService {
    /// Create a new like service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_publisher: EventPublisherService,
        max_attempts: u32,
    ) -> Self {
        Self {
            post_repo: PostRepository::new(db.clone()),
            likes_repo: UserLikesRepository::new(db.clone()),
            db,
            event_publisher,
            max_attempts,
        }
    }

    /// Like or unlike a post. Returns `true` when the post is now liked.
    pub async fn toggle_like(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        if user_id.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let liked = run_transaction(&self.db, self.max_attempts, |txn| {
            let post_repo = self.post_repo.clone();
            let likes_repo = self.likes_repo.clone();
            let user_id = user_id.to_string();
            let post_id = post_id.to_string();
            Box::pin(async move {
                let post = post_repo
                    .find_by_id_tx(txn, &post_id)
                    .await?
                    .ok_or_else(|| AppError::PostNotFound(post_id.clone()))?;
                if post.is_locked {
                    return Err(AppError::Locked("Post is locked".to_string()));
                }
                let mut index = likes_repo.find_tx(txn, &user_id).await?;

                let (liked, like_count) = if index.post_ids.remove(&post_id) {
                    (false, post.like_count - 1)
                } else {
                    index.post_ids.insert(post_id.clone());
                    (true, post.like_count + 1)
                };

                likes_repo.save_tx(txn, &user_id, &index).await?;
                post_repo
                    .set_like_count_tx(txn, &post_id, post.version, like_count)
                    .await?;
                Ok(liked)
            })
        })
        .await?;

        debug!(user_id = %user_id, post_id = %post_id, liked, "Like toggled");
        publish_quietly(
            &self.event_publisher,
            StoreEvent::PostChanged {
                id: post_id.to_string(),
            },
        )
        .await;
        publish_quietly(
            &self.event_publisher,
            StoreEvent::LikesChanged {
                user_id: user_id.to_string(),
            },
        )
        .await;

        Ok(liked)
    }

    /// Ids of the posts a user likes. Empty when the user never liked anything.
    pub async fn liked_posts(&self, user_id: &str) -> AppResult<Vec<String>> {
        let index = self.likes_repo.find(user_id).await?;
        debug!(user_id = %user_id, count = index.post_ids.len(), "Liked posts read");
        Ok(index.post_ids.into_iter().collect())
    }
}
