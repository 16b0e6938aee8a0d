//! Article repository.

use std::sync::Arc;

use companion_common::AppResult;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect,
};

use super::db_err;
use crate::entities::{Article, article};

/// Article repository for database operations.
#[derive(Clone)]
pub struct ArticleRepository {
    db: Arc<DatabaseConnection>,
}

impl ArticleRepository {
    /// Create a new article repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an article by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<article::Model>> {
        Article::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Insert a complete article.
    pub async fn create(&self, model: article::ActiveModel) -> AppResult<article::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Newest articles first.
    pub async fn find_latest(&self, limit: u64) -> AppResult<Vec<article::Model>> {
        Article::find()
            .order_by_desc(article::Column::CreatedAt)
            .order_by_desc(article::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Delete an article. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = Article::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;
    use chrono::{Duration, Utc};
    use sea_orm::Set;
    use serde_json::json;

    fn new_article(id: &str, age_days: i64) -> article::ActiveModel {
        article::ActiveModel {
            id: Set(id.to_string()),
            title: Set(format!("News {id}")),
            created_at: Set((Utc::now() - Duration::days(age_days)).into()),
            thumbnail_url: Set(format!("http://localhost/files/articles/{id}/thumbnail.png")),
            blocks: Set(json!([{ "type": "text", "text": "Patch notes" }])),
        }
    }

    #[tokio::test]
    async fn test_latest_is_newest_first_and_limited() {
        let db = TestDatabase::new().await.unwrap();
        let repo = ArticleRepository::new(db.shared());
        for (id, age) in [("a1", 3), ("a2", 1), ("a3", 2)] {
            repo.create(new_article(id, age)).await.unwrap();
        }

        let latest = repo.find_latest(2).await.unwrap();
        let ids: Vec<&str> = latest.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a2", "a3"]);
    }

    #[tokio::test]
    async fn test_delete_reports_missing_rows() {
        let db = TestDatabase::new().await.unwrap();
        let repo = ArticleRepository::new(db.shared());
        repo.create(new_article("a1", 0)).await.unwrap();

        assert!(repo.delete("a1").await.unwrap());
        assert!(!repo.delete("a1").await.unwrap());
        assert!(repo.find_by_id("a1").await.unwrap().is_none());
    }
}
