//! Post repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use companion_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, prelude::Json, sea_query::Expr,
};

use super::{SCAN_PAGE_SIZE, db_err, decode_json, expect_one};
use crate::entities::{Post, post};

/// Sort order for filtered post queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostOrder {
    /// Most liked first.
    HotFirst,
    /// Newest first.
    #[default]
    NewestFirst,
    /// Oldest first.
    OldestFirst,
}

/// Filter for the post search.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Title must start with this text.
    pub title_prefix: Option<String>,
    /// Post must carry at least one of these hashtags.
    pub hashtags: Vec<String>,
    /// Created at or after.
    pub from: Option<DateTime<Utc>>,
    /// Created at or before.
    pub to: Option<DateTime<Utc>>,
    /// Sort order.
    pub order: PostOrder,
    /// Maximum number of results.
    pub limit: u64,
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find a post by ID inside a transaction.
    pub async fn find_by_id_tx(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
    ) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id).one(txn).await.map_err(db_err)
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Set the like counter, guarded by the version read in this transaction.
    pub async fn set_like_count_tx(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
        version: i32,
        like_count: i32,
    ) -> AppResult<()> {
        expect_one(
            Post::update_many()
                .col_expr(post::Column::LikeCount, Expr::value(like_count))
                .col_expr(post::Column::Version, Expr::value(version + 1))
                .filter(post::Column::Id.eq(id))
                .filter(post::Column::Version.eq(version))
                .exec(txn)
                .await,
            "post",
        )
    }

    /// Set the comment counter, guarded by the version read in this transaction.
    pub async fn set_comment_count_tx(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
        version: i32,
        comment_count: i32,
    ) -> AppResult<()> {
        expect_one(
            Post::update_many()
                .col_expr(post::Column::CommentCount, Expr::value(comment_count))
                .col_expr(post::Column::Version, Expr::value(version + 1))
                .filter(post::Column::Id.eq(id))
                .filter(post::Column::Version.eq(version))
                .exec(txn)
                .await,
            "post",
        )
    }

    /// Set the lock flag, guarded by version.
    pub async fn set_locked_tx(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
        version: i32,
        locked: bool,
    ) -> AppResult<()> {
        expect_one(
            Post::update_many()
                .col_expr(post::Column::IsLocked, Expr::value(locked))
                .col_expr(post::Column::Version, Expr::value(version + 1))
                .filter(post::Column::Id.eq(id))
                .filter(post::Column::Version.eq(version))
                .exec(txn)
                .await,
            "post",
        )
    }

    /// Replace title, content and hashtags, marking the post edited.
    pub async fn update_content_tx(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
        version: i32,
        title: &str,
        content: &str,
        hashtags: Json,
    ) -> AppResult<()> {
        expect_one(
            Post::update_many()
                .col_expr(post::Column::Title, Expr::value(title))
                .col_expr(post::Column::Content, Expr::value(content))
                .col_expr(post::Column::Hashtags, Expr::value(hashtags))
                .col_expr(post::Column::IsEdited, Expr::value(true))
                .col_expr(post::Column::UpdatedAt, Expr::value(Utc::now()))
                .col_expr(post::Column::Version, Expr::value(version + 1))
                .filter(post::Column::Id.eq(id))
                .filter(post::Column::Version.eq(version))
                .exec(txn)
                .await,
            "post",
        )
    }

    /// Replace the linked picture URLs.
    pub async fn set_linked_pictures_tx(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
        version: i32,
        pictures: Json,
    ) -> AppResult<()> {
        expect_one(
            Post::update_many()
                .col_expr(post::Column::LinkedPictures, Expr::value(pictures))
                .col_expr(post::Column::Version, Expr::value(version + 1))
                .filter(post::Column::Id.eq(id))
                .filter(post::Column::Version.eq(version))
                .exec(txn)
                .await,
            "post",
        )
    }

    /// Delete a post, guarded by version.
    pub async fn delete_tx(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
        version: i32,
    ) -> AppResult<()> {
        let result = Post::delete_many()
            .filter(post::Column::Id.eq(id))
            .filter(post::Column::Version.eq(version))
            .exec(txn)
            .await
            .map_err(|e| crate::map_write_err("post", e))?;
        if result.rows_affected == 0 {
            return Err(AppError::WriteConflict("post".to_string()));
        }
        Ok(())
    }

    /// Latest posts, newest first.
    pub async fn find_latest(&self, limit: u64) -> AppResult<Vec<post::Model>> {
        Post::find()
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Posts by an author, newest first.
    pub async fn find_by_author(&self, author_id: &str) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::AuthorId.eq(author_id))
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Search posts.
    ///
    /// Date range and ordering run in the query. The title prefix is narrowed
    /// by a range in the query and matched exactly (case-sensitive, no
    /// wildcards) per page, together with the hashtag any-of match, until
    /// `limit` posts are collected.
    pub async fn search(&self, filter: &PostFilter) -> AppResult<Vec<post::Model>> {
        let mut query = Post::find();

        let prefix = filter.title_prefix.as_deref().filter(|p| !p.is_empty());
        if let Some(prefix) = prefix {
            query = query
                .filter(post::Column::Title.gte(prefix))
                .filter(post::Column::Title.lte(format!("{prefix}{}", char::MAX)));
        }
        if let Some(from) = filter.from {
            query = query.filter(post::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(post::Column::CreatedAt.lte(to));
        }

        query = match filter.order {
            PostOrder::HotFirst => query
                .order_by_desc(post::Column::LikeCount)
                .order_by_desc(post::Column::CreatedAt),
            PostOrder::NewestFirst => query.order_by_desc(post::Column::CreatedAt),
            PostOrder::OldestFirst => query.order_by_asc(post::Column::CreatedAt),
        }
        .order_by_asc(post::Column::Id);

        if prefix.is_none() && filter.hashtags.is_empty() {
            return query
                .limit(filter.limit)
                .all(self.db.as_ref())
                .await
                .map_err(db_err);
        }

        let mut matched = Vec::new();
        let mut offset = 0;
        loop {
            let page = query
                .clone()
                .offset(offset)
                .limit(SCAN_PAGE_SIZE)
                .all(self.db.as_ref())
                .await
                .map_err(db_err)?;
            let page_len = page.len() as u64;

            for model in page {
                if prefix.is_some_and(|p| !model.title.starts_with(p)) {
                    continue;
                }
                if !filter.hashtags.is_empty() {
                    let tags: Vec<String> = decode_json(&model.hashtags, "post hashtags")?;
                    if !tags.iter().any(|t| filter.hashtags.contains(t)) {
                        continue;
                    }
                }
                matched.push(model);
                if matched.len() as u64 >= filter.limit {
                    return Ok(matched);
                }
            }

            if page_len < SCAN_PAGE_SIZE {
                return Ok(matched);
            }
            offset += SCAN_PAGE_SIZE;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;
    use crate::run_transaction;
    use chrono::Duration;
    use sea_orm::Set;
    use serde_json::json;

    fn new_post(id: &str, title: &str, tags: &[&str], likes: i32, age_days: i64) -> post::ActiveModel {
        let created = Utc::now() - Duration::days(age_days);
        post::ActiveModel {
            id: Set(id.to_string()),
            title: Set(title.to_string()),
            content: Set("body".to_string()),
            author_id: Set("author".to_string()),
            username: Set("alice".to_string()),
            created_at: Set(created.into()),
            updated_at: Set(created.into()),
            hashtags: Set(json!(tags)),
            comment_count: Set(0),
            like_count: Set(likes),
            is_edited: Set(false),
            is_locked: Set(false),
            linked_pictures: Set(json!([])),
            version: Set(0),
        }
    }

    #[tokio::test]
    async fn test_stale_version_is_a_write_conflict() {
        let db = TestDatabase::new().await.unwrap();
        let repo = PostRepository::new(db.shared());
        repo.create(new_post("p1", "Hello", &[], 0, 0)).await.unwrap();

        let result: AppResult<()> = run_transaction(&db.conn, 2, |txn| {
            let repo = repo.clone();
            Box::pin(async move { repo.set_like_count_tx(txn, "p1", 7, 1).await })
        })
        .await;
        assert!(matches!(result, Err(AppError::RetriesExhausted(2))));

        let post = repo.find_by_id("p1").await.unwrap().unwrap();
        assert_eq!(post.like_count, 0);
        assert_eq!(post.version, 0);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_retried_against_fresh_reads() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let db = TestDatabase::new().await.unwrap();
        let repo = PostRepository::new(db.shared());
        repo.create(new_post("p1", "Hello", &[], 0, 0)).await.unwrap();
        let attempts = Arc::new(AtomicU32::new(0));

        let liked = run_transaction(&db.conn, 3, |txn| {
            let repo = repo.clone();
            let attempts = attempts.clone();
            Box::pin(async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                let post = repo.find_by_id_tx(txn, "p1").await?.unwrap();
                if attempt == 1 {
                    // Another liker lands between our read and our write.
                    repo.set_like_count_tx(txn, "p1", post.version, post.like_count + 1)
                        .await?;
                }
                repo.set_like_count_tx(txn, "p1", post.version, post.like_count + 1)
                    .await?;
                Ok(post.like_count + 1)
            })
        })
        .await
        .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(liked, 1);
        let post = repo.find_by_id("p1").await.unwrap().unwrap();
        assert_eq!(post.like_count, 1);
        assert_eq!(post.version, 1);
    }

    #[tokio::test]
    async fn test_versioned_update_bumps_version() {
        let db = TestDatabase::new().await.unwrap();
        let repo = PostRepository::new(db.shared());
        repo.create(new_post("p1", "Hello", &[], 0, 0)).await.unwrap();

        run_transaction(&db.conn, 1, |txn| {
            let repo = repo.clone();
            Box::pin(async move { repo.set_comment_count_tx(txn, "p1", 0, 3).await })
        })
        .await
        .unwrap();

        let post = repo.find_by_id("p1").await.unwrap().unwrap();
        assert_eq!(post.comment_count, 3);
        assert_eq!(post.version, 1);
    }

    #[tokio::test]
    async fn test_search_filters_and_orders() {
        let db = TestDatabase::new().await.unwrap();
        let repo = PostRepository::new(db.shared());
        repo.create(new_post("p1", "Rust tips", &["rust"], 1, 3)).await.unwrap();
        repo.create(new_post("p2", "Rust news", &["news"], 9, 2)).await.unwrap();
        repo.create(new_post("p3", "Cooking", &["rust", "food"], 5, 1)).await.unwrap();

        let hot = repo
            .search(&PostFilter {
                order: PostOrder::HotFirst,
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = hot.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p2", "p3", "p1"]);

        let tagged = repo
            .search(&PostFilter {
                hashtags: vec!["rust".to_string()],
                order: PostOrder::OldestFirst,
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = tagged.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p1", "p3"]);

        let prefixed = repo
            .search(&PostFilter {
                title_prefix: Some("Rust".to_string()),
                from: Some(Utc::now() - Duration::days(2) - Duration::hours(1)),
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = prefixed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p2"]);
    }

    #[tokio::test]
    async fn test_title_prefix_is_exact() {
        let db = TestDatabase::new().await.unwrap();
        let repo = PostRepository::new(db.shared());
        repo.create(new_post("p1", "Rust tips", &[], 0, 2)).await.unwrap();
        repo.create(new_post("p2", "500 gold run", &[], 0, 1)).await.unwrap();
        repo.create(new_post("p3", "100% drop rate", &[], 0, 0)).await.unwrap();

        let titles = |prefix: &str| {
            let repo = repo.clone();
            let filter = PostFilter {
                title_prefix: Some(prefix.to_string()),
                order: PostOrder::OldestFirst,
                limit: 100,
                ..Default::default()
            };
            async move {
                repo.search(&filter)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|p| p.title)
                    .collect::<Vec<_>>()
            }
        };

        assert!(titles("rust").await.is_empty());
        assert_eq!(titles("Rust").await, ["Rust tips"]);
        assert!(titles("%").await.is_empty());
        assert!(titles("5_0").await.is_empty());
        assert_eq!(titles("100%").await, ["100% drop rate"]);
    }
}
