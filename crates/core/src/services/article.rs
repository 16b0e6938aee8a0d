//! Article service.
//!
//! Articles are admin-authored pages: a title, a thumbnail and an ordered
//! list of text and image blocks. Blobs live under `articles/{id}/`; the row
//! is written once every upload has succeeded.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use companion_common::{
    AppError, AppResult, BlobStore, IdGenerator, image_extension,
};
use companion_db::{
    entities::article,
    repositories::{ArticleRepository, decode_json, encode_json},
};
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::services::event_publisher::{EventPublisherService, StoreEvent, publish_quietly};
use crate::services::identity::Identity;
use crate::services::post::ImageUpload;

/// Number of articles listed.
pub const LATEST_ARTICLES_LIMIT: u64 = 50;

/// One stored block of an article body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ArticleBlock {
    Text { text: String },
    Image { url: String },
}

/// An article with its blocks decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<FixedOffset>,
    pub thumbnail_url: String,
    pub blocks: Vec<ArticleBlock>,
}

impl TryFrom<article::Model> for Article {
    type Error = AppError;

    fn try_from(model: article::Model) -> AppResult<Self> {
        Ok(Self {
            blocks: decode_json(&model.blocks, "article blocks")?,
            id: model.id,
            title: model.title,
            created_at: model.created_at,
            thumbnail_url: model.thumbnail_url,
        })
    }
}

/// One block of a new article.
#[derive(Debug, Clone)]
pub enum ArticleBlockInput {
    Text(String),
    Image(ImageUpload),
}

/// Input for publishing an article.
#[derive(Debug, Validate)]
pub struct CreateArticleInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    pub thumbnail: ImageUpload,

    pub blocks: Vec<ArticleBlockInput>,
}

/// Article service for business logic.
#[derive(Clone)]
pub struct ArticleService {
    article_repo: ArticleRepository,
    blobs: Arc<dyn BlobStore>,
    event_publisher: EventPublisherService,
    id_gen: IdGenerator,
}

impl ArticleService {
    /// Create a new article service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        blobs: Arc<dyn BlobStore>,
        event_publisher: EventPublisherService,
    ) -> Self {
        Self {
            article_repo: ArticleRepository::new(db),
            blobs,
            event_publisher,
            id_gen: IdGenerator::new(),
        }
    }

    /// The newest articles, newest first.
    pub async fn latest(&self) -> AppResult<Vec<Article>> {
        self.article_repo
            .find_latest(LATEST_ARTICLES_LIMIT)
            .await?
            .into_iter()
            .map(Article::try_from)
            .collect()
    }

    /// Get one article.
    pub async fn get(&self, article_id: &str) -> AppResult<Article> {
        self.article_repo
            .find_by_id(article_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Article {article_id}")))?
            .try_into()
    }

    /// Publish an article. Admin only.
    ///
    /// The thumbnail goes to `articles/{id}/thumbnail.{ext}` and the image of
    /// block `i` to `articles/{id}/images/{i}.{ext}`. When any upload or the
    /// insert fails, everything uploaded so far is removed again.
    pub async fn create(
        &self,
        actor: &Identity,
        mut input: CreateArticleInput,
    ) -> AppResult<Article> {
        actor.require_admin()?;
        input.title = input.title.trim().to_string();
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let id = self.id_gen.generate();
        let prefix = format!("articles/{id}/");

        let created = match self.upload_and_insert(&id, &prefix, input).await {
            Ok(created) => created,
            Err(e) => {
                self.discard_prefix(&prefix).await;
                return Err(e);
            }
        };

        info!(article_id = %id, actor = %actor.uid, "Article published");
        publish_quietly(&self.event_publisher, StoreEvent::ArticlesChanged).await;
        created.try_into()
    }

    /// Delete an article and its blobs. Admin only.
    pub async fn delete(&self, actor: &Identity, article_id: &str) -> AppResult<()> {
        actor.require_admin()?;
        if !self.article_repo.delete(article_id).await? {
            return Err(AppError::NotFound(format!("Article {article_id}")));
        }

        info!(article_id = %article_id, actor = %actor.uid, "Article deleted");
        publish_quietly(&self.event_publisher, StoreEvent::ArticlesChanged).await;
        self.discard_prefix(&format!("articles/{article_id}/")).await;
        Ok(())
    }

    async fn upload_and_insert(
        &self,
        id: &str,
        prefix: &str,
        input: CreateArticleInput,
    ) -> AppResult<article::Model> {
        let thumb = &input.thumbnail;
        let thumbnail = self
            .blobs
            .upload(
                &format!("{prefix}thumbnail.{}", image_extension(&thumb.content_type)),
                &thumb.data,
                &thumb.content_type,
            )
            .await?;

        let mut blocks = Vec::with_capacity(input.blocks.len());
        for (i, block) in input.blocks.into_iter().enumerate() {
            blocks.push(match block {
                ArticleBlockInput::Text(text) => ArticleBlock::Text { text },
                ArticleBlockInput::Image(image) => {
                    let path = format!(
                        "{prefix}images/{i}.{}",
                        image_extension(&image.content_type)
                    );
                    let blob = self
                        .blobs
                        .upload(&path, &image.data, &image.content_type)
                        .await?;
                    ArticleBlock::Image { url: blob.url }
                }
            });
        }

        self.article_repo
            .create(article::ActiveModel {
                id: Set(id.to_string()),
                title: Set(input.title),
                created_at: Set(Utc::now().into()),
                thumbnail_url: Set(thumbnail.url),
                blocks: Set(encode_json(&blocks, "article blocks")?),
            })
            .await
    }

    async fn discard_prefix(&self, prefix: &str) {
        if let Err(e) = self.blobs.delete_prefix(prefix).await {
            warn!(prefix = %prefix, error = %e, "Failed to delete article blobs");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_json_shape() {
        let blocks = vec![
            ArticleBlock::Text {
                text: "Season 3".into(),
            },
            ArticleBlock::Image {
                url: "http://localhost/files/articles/a1/images/1.png".into(),
            },
        ];
        assert_eq!(
            serde_json::to_value(&blocks).unwrap_or_default(),
            json!([
                { "type": "text", "text": "Season 3" },
                { "type": "image", "url": "http://localhost/files/articles/a1/images/1.png" }
            ])
        );
    }
}
