//! Post service.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use companion_common::{AppError, AppResult, BlobStore, IdGenerator, image_extension};
use companion_db::{
    entities::post,
    repositories::{
        CommentRepository, PostFilter, PostOrder, PostRepository, SCAN_PAGE_SIZE, UserLikesRepository,
        UserRepository, decode_json, encode_json,
    },
    run_transaction,
};
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use crate::services::event_publisher::{EventPublisherService, StoreEvent, publish_quietly};
use crate::services::identity::Identity;

/// Number of posts on the front page.
pub const LATEST_POSTS_LIMIT: u64 = 25;

/// Maximum number of posts a filtered search returns.
pub const MAX_FILTERED_POSTS: u64 = 100;

/// A forum post with its JSON fields decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub username: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub hashtags: Vec<String>,
    pub comment_count: i32,
    pub like_count: i32,
    pub is_edited: bool,
    pub is_locked: bool,
    pub linked_pictures: Vec<String>,
}

impl TryFrom<post::Model> for Post {
    type Error = AppError;

    fn try_from(model: post::Model) -> AppResult<Self> {
        Ok(Self {
            hashtags: decode_json(&model.hashtags, "post hashtags")?,
            linked_pictures: decode_json(&model.linked_pictures, "post pictures")?,
            id: model.id,
            title: model.title,
            content: model.content,
            author_id: model.author_id,
            username: model.username,
            created_at: model.created_at,
            updated_at: model.updated_at,
            comment_count: model.comment_count,
            like_count: model.like_count,
            is_edited: model.is_edited,
            is_locked: model.is_locked,
        })
    }
}

fn to_posts(models: Vec<post::Model>) -> AppResult<Vec<Post>> {
    models.into_iter().map(Post::try_from).collect()
}

/// Input for creating a post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 10000))]
    pub content: String,

    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// Input for editing a post. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct EditPostInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 10000))]
    pub content: Option<String>,

    pub hashtags: Option<Vec<String>>,
}

/// An image to attach to a post.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Parameters of the post search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSearch {
    pub title: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Most liked first; otherwise by creation date.
    #[serde(default)]
    pub hot_first: bool,
    /// Oldest first when sorting by date.
    #[serde(default)]
    pub ascending: bool,
    pub limit: Option<u64>,
}

/// Normalize hashtags: trim, drop a leading `#`, drop empties and duplicates.
fn normalize_hashtags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

fn can_moderate(actor: &Identity, author_id: &str) -> bool {
    actor.is_admin || actor.uid == author_id
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    db: Arc<DatabaseConnection>,
    post_repo: PostRepository,
    comment_repo: CommentRepository,
    likes_repo: UserLikesRepository,
    user_repo: UserRepository,
    blobs: Arc<dyn BlobStore>,
    event_publisher: EventPublisherService,
    max_attempts: u32,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        blobs: Arc<dyn BlobStore>,
        event_publisher: EventPublisherService,
        max_attempts: u32,
    ) -> Self {
        Self {
            post_repo: PostRepository::new(db.clone()),
            comment_repo: CommentRepository::new(db.clone()),
            likes_repo: UserLikesRepository::new(db.clone()),
            user_repo: UserRepository::new(db.clone()),
            db,
            blobs,
            event_publisher,
            max_attempts,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a post with zero counters.
    pub async fn create(&self, actor: &Identity, mut input: CreatePostInput) -> AppResult<Post> {
        input.title = input.title.trim().to_string();
        input.validate()?;

        let author = self
            .user_repo
            .find_by_id(&actor.uid)
            .await?
            .ok_or_else(|| AppError::UserNotFound(actor.uid.clone()))?;

        let now = Utc::now();
        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title),
            content: Set(input.content),
            author_id: Set(author.id),
            username: Set(author.username),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            hashtags: Set(encode_json(&normalize_hashtags(&input.hashtags), "post hashtags")?),
            comment_count: Set(0),
            like_count: Set(0),
            is_edited: Set(false),
            is_locked: Set(false),
            linked_pictures: Set(json!([])),
            version: Set(0),
        };

        let created = Post::try_from(self.post_repo.create(model).await?)?;
        info!(post_id = %created.id, author_id = %created.author_id, "Post created");
        publish_quietly(
            &self.event_publisher,
            StoreEvent::PostChanged {
                id: created.id.clone(),
            },
        )
        .await;
        Ok(created)
    }

    /// Get a post.
    pub async fn get(&self, post_id: &str) -> AppResult<Post> {
        self.post_repo
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))
            .and_then(Post::try_from)
    }

    /// Whether a post exists.
    pub async fn exists(&self, post_id: &str) -> AppResult<bool> {
        Ok(self.post_repo.find_by_id(post_id).await?.is_some())
    }

    /// The newest posts.
    pub async fn latest(&self) -> AppResult<Vec<Post>> {
        to_posts(self.post_repo.find_latest(LATEST_POSTS_LIMIT).await?)
    }

    /// Posts written by a user, newest first.
    pub async fn by_user(&self, uid: &str) -> AppResult<Vec<Post>> {
        to_posts(self.post_repo.find_by_author(uid).await?)
    }

    /// Filtered search, capped at [`MAX_FILTERED_POSTS`].
    pub async fn search(&self, search: PostSearch) -> AppResult<Vec<Post>> {
        let order = if search.hot_first {
            PostOrder::HotFirst
        } else if search.ascending {
            PostOrder::OldestFirst
        } else {
            PostOrder::NewestFirst
        };

        let filter = PostFilter {
            title_prefix: search.title.map(|t| t.trim().to_string()),
            hashtags: normalize_hashtags(&search.hashtags),
            from: search.date_from,
            to: search.date_to,
            order,
            limit: search
                .limit
                .unwrap_or(MAX_FILTERED_POSTS)
                .clamp(1, MAX_FILTERED_POSTS),
        };

        to_posts(self.post_repo.search(&filter).await?)
    }

    /// Edit title, content or hashtags. Author only; rejected on a locked post.
    pub async fn edit(
        &self,
        actor: &Identity,
        post_id: &str,
        mut input: EditPostInput,
    ) -> AppResult<Post> {
        input.title = input.title.map(|t| t.trim().to_string());
        input.validate()?;
        let hashtags = input.hashtags.as_deref().map(normalize_hashtags);

        run_transaction(&self.db, self.max_attempts, |txn| {
            let repo = self.post_repo.clone();
            let actor_id = actor.uid.clone();
            let post_id = post_id.to_string();
            let title = input.title.clone();
            let content = input.content.clone();
            let hashtags = hashtags.clone();
            Box::pin(async move {
                let post = repo
                    .find_by_id_tx(txn, &post_id)
                    .await?
                    .ok_or_else(|| AppError::PostNotFound(post_id.clone()))?;
                if post.author_id != actor_id {
                    return Err(AppError::Forbidden("Only the author can edit a post".to_string()));
                }
                if post.is_locked {
                    return Err(AppError::Locked("Post is locked".to_string()));
                }

                let hashtags = match hashtags {
                    Some(tags) => encode_json(&tags, "post hashtags")?,
                    None => post.hashtags.clone(),
                };
                repo.update_content_tx(
                    txn,
                    &post_id,
                    post.version,
                    title.as_deref().unwrap_or(&post.title),
                    content.as_deref().unwrap_or(&post.content),
                    hashtags,
                )
                .await
            })
        })
        .await?;

        info!(post_id = %post_id, "Post edited");
        publish_quietly(
            &self.event_publisher,
            StoreEvent::PostChanged {
                id: post_id.to_string(),
            },
        )
        .await;
        self.get(post_id).await
    }

    /// Flip the lock flag. Author or admin. Returns the new state.
    pub async fn toggle_lock(&self, actor: &Identity, post_id: &str) -> AppResult<bool> {
        let locked = run_transaction(&self.db, self.max_attempts, |txn| {
            let repo = self.post_repo.clone();
            let actor = actor.clone();
            let post_id = post_id.to_string();
            Box::pin(async move {
                let post = repo
                    .find_by_id_tx(txn, &post_id)
                    .await?
                    .ok_or_else(|| AppError::PostNotFound(post_id.clone()))?;
                if !can_moderate(&actor, &post.author_id) {
                    return Err(AppError::Forbidden(
                        "Only the author or an admin can lock a post".to_string(),
                    ));
                }
                let locked = !post.is_locked;
                repo.set_locked_tx(txn, &post_id, post.version, locked).await?;
                Ok(locked)
            })
        })
        .await?;

        info!(post_id = %post_id, locked, "Post lock toggled");
        publish_quietly(
            &self.event_publisher,
            StoreEvent::PostChanged {
                id: post_id.to_string(),
            },
        )
        .await;
        Ok(locked)
    }

    /// Upload images and append their URLs to the post. Author only; rejected on a locked post.
    pub async fn attach_images(
        &self,
        actor: &Identity,
        post_id: &str,
        images: Vec<ImageUpload>,
    ) -> AppResult<Post> {
        let post = self.get(post_id).await?;
        if post.author_id != actor.uid {
            return Err(AppError::Forbidden(
                "Only the author can add images".to_string(),
            ));
        }
        if post.is_locked {
            return Err(AppError::Locked("Post is locked".to_string()));
        }
        if images.is_empty() {
            return Ok(post);
        }

        let mut uploaded = Vec::with_capacity(images.len());
        for image in &images {
            let path = format!(
                "forum/{post_id}/{}.{}",
                self.id_gen.generate_blob_name(),
                image_extension(&image.content_type)
            );
            match self.blobs.upload(&path, &image.data, &image.content_type).await {
                Ok(blob) => uploaded.push(blob),
                Err(e) => {
                    self.discard_blobs(uploaded.iter().map(|b| b.path.as_str())).await;
                    return Err(e);
                }
            }
        }
        let urls: Vec<String> = uploaded.iter().map(|b| b.url.clone()).collect();

        let result = run_transaction(&self.db, self.max_attempts, |txn| {
            let repo = self.post_repo.clone();
            let post_id = post_id.to_string();
            let urls = urls.clone();
            Box::pin(async move {
                let post = repo
                    .find_by_id_tx(txn, &post_id)
                    .await?
                    .ok_or_else(|| AppError::PostNotFound(post_id.clone()))?;
                if post.is_locked {
                    return Err(AppError::Locked("Post is locked".to_string()));
                }
                let mut pictures: Vec<String> =
                    decode_json(&post.linked_pictures, "post pictures")?;
                pictures.extend(urls);
                repo.set_linked_pictures_tx(
                    txn,
                    &post_id,
                    post.version,
                    encode_json(&pictures, "post pictures")?,
                )
                .await
            })
        })
        .await;

        if let Err(e) = result {
            self.discard_blobs(uploaded.iter().map(|b| b.path.as_str())).await;
            return Err(e);
        }

        info!(post_id = %post_id, count = uploaded.len(), "Images attached");
        publish_quietly(
            &self.event_publisher,
            StoreEvent::PostChanged {
                id: post_id.to_string(),
            },
        )
        .await;
        self.get(post_id).await
    }

    /// Remove one image from a post and delete its blob. Author only.
    pub async fn delete_image(&self, actor: &Identity, post_id: &str, url: &str) -> AppResult<Post> {
        run_transaction(&self.db, self.max_attempts, |txn| {
            let repo = self.post_repo.clone();
            let actor_id = actor.uid.clone();
            let post_id = post_id.to_string();
            let url = url.to_string();
            Box::pin(async move {
                let post = repo
                    .find_by_id_tx(txn, &post_id)
                    .await?
                    .ok_or_else(|| AppError::PostNotFound(post_id.clone()))?;
                if post.author_id != actor_id {
                    return Err(AppError::Forbidden(
                        "Only the author can remove images".to_string(),
                    ));
                }
                let mut pictures: Vec<String> =
                    decode_json(&post.linked_pictures, "post pictures")?;
                let before = pictures.len();
                pictures.retain(|p| p != &url);
                if pictures.len() == before {
                    return Err(AppError::NotFound(format!("Image {url}")));
                }
                repo.set_linked_pictures_tx(
                    txn,
                    &post_id,
                    post.version,
                    encode_json(&pictures, "post pictures")?,
                )
                .await
            })
        })
        .await?;

        let prefix = format!("forum/{post_id}/");
        if let Some(start) = url.find(&prefix) {
            self.discard_blobs(std::iter::once(&url[start..])).await;
        }

        publish_quietly(
            &self.event_publisher,
            StoreEvent::PostChanged {
                id: post_id.to_string(),
            },
        )
        .await;
        self.get(post_id).await
    }

    /// Delete a post and its comments. Author or admin.
    ///
    /// The post and its comments go in one transaction. Afterwards the post's
    /// blobs are deleted and its id is scrubbed from every like index; those
    /// follow-ups are best-effort and only logged on failure.
    pub async fn delete(&self, actor: &Identity, post_id: &str) -> AppResult<()> {
        let removed_comments = run_transaction(&self.db, self.max_attempts, |txn| {
            let post_repo = self.post_repo.clone();
            let comment_repo = self.comment_repo.clone();
            let actor = actor.clone();
            let post_id = post_id.to_string();
            Box::pin(async move {
                let post = post_repo
                    .find_by_id_tx(txn, &post_id)
                    .await?
                    .ok_or_else(|| AppError::PostNotFound(post_id.clone()))?;
                if !can_moderate(&actor, &post.author_id) {
                    return Err(AppError::Forbidden(
                        "Only the author or an admin can delete a post".to_string(),
                    ));
                }
                let removed = comment_repo.delete_by_post_tx(txn, &post_id).await?;
                post_repo.delete_tx(txn, &post_id, post.version).await?;
                Ok(removed)
            })
        })
        .await?;

        info!(post_id = %post_id, removed_comments, actor = %actor.uid, "Post deleted");
        publish_quietly(
            &self.event_publisher,
            StoreEvent::PostDeleted {
                id: post_id.to_string(),
            },
        )
        .await;
        publish_quietly(
            &self.event_publisher,
            StoreEvent::CommentsChanged {
                post_id: post_id.to_string(),
            },
        )
        .await;

        match self.blobs.delete_prefix(&format!("forum/{post_id}/")).await {
            Ok(count) if count > 0 => info!(post_id = %post_id, count, "Post images deleted"),
            Ok(_) => {}
            Err(e) => warn!(post_id = %post_id, error = %e, "Failed to delete post images"),
        }

        if let Err(e) = self.scrub_likes(post_id).await {
            warn!(post_id = %post_id, error = %e, "Failed to scrub like indexes");
        }

        Ok(())
    }

    /// Remove a deleted post's id from every like index containing it.
    async fn scrub_likes(&self, post_id: &str) -> AppResult<usize> {
        let mut scrubbed = 0;
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .likes_repo
                .scan_page(cursor.as_deref(), SCAN_PAGE_SIZE)
                .await?;
            let Some(last) = page.last() else { break };
            cursor = Some(last.user_id.clone());
            let full_page = page.len() as u64 == SCAN_PAGE_SIZE;

            for row in page {
                let ids: Vec<String> = decode_json(&row.liked_post_ids, "like index")?;
                if !ids.iter().any(|id| id == post_id) {
                    continue;
                }

                run_transaction(&self.db, self.max_attempts, |txn| {
                    let repo = self.likes_repo.clone();
                    let user_id = row.user_id.clone();
                    let post_id = post_id.to_string();
                    Box::pin(async move {
                        let mut index = repo.find_tx(txn, &user_id).await?;
                        if index.post_ids.remove(&post_id) {
                            repo.save_tx(txn, &user_id, &index).await?;
                        }
                        Ok(())
                    })
                })
                .await?;

                scrubbed += 1;
                publish_quietly(
                    &self.event_publisher,
                    StoreEvent::LikesChanged {
                        user_id: row.user_id.clone(),
                    },
                )
                .await;
            }

            if !full_page {
                break;
            }
        }

        Ok(scrubbed)
    }

    async fn discard_blobs<'a>(&self, paths: impl Iterator<Item = &'a str>) {
        for path in paths {
            if let Err(e) = self.blobs.delete(path).await {
                warn!(path = %path, error = %e, "Failed to delete blob");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_hashtags() {
        let tags = vec![
            "#rust".to_string(),
            " rust ".to_string(),
            String::new(),
            "#".to_string(),
            "async".to_string(),
        ];
        assert_eq!(normalize_hashtags(&tags), vec!["rust", "async"]);
    }

    #[test]
    fn test_can_moderate() {
        let admin = Identity {
            uid: "admin".into(),
            email: "admin@example.com".into(),
            is_admin: true,
        };
        let user = Identity {
            uid: "u1".into(),
            email: "u1@example.com".into(),
            is_admin: false,
        };
        assert!(can_moderate(&admin, "someone"));
        assert!(can_moderate(&user, "u1"));
        assert!(!can_moderate(&user, "u2"));
    }
}
