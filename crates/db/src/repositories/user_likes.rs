//! Like index repository.

use std::collections::BTreeSet;
use std::sync::Arc;

use companion_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};

use super::{db_err, decode_json, encode_json, expect_one};
use crate::entities::{UserLikes, user_likes};

/// A user's liked post ids together with the version they were read at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LikeIndex {
    /// Liked post ids.
    pub post_ids: BTreeSet<String>,
    /// Row version, `None` when the user has no index yet.
    pub version: Option<i32>,
}

impl LikeIndex {
    fn from_model(model: &user_likes::Model) -> AppResult<Self> {
        Ok(Self {
            post_ids: decode_json(&model.liked_post_ids, "like index")?,
            version: Some(model.version),
        })
    }
}

/// Like index repository for database operations.
#[derive(Clone)]
pub struct UserLikesRepository {
    db: Arc<DatabaseConnection>,
}

impl UserLikesRepository {
    /// Create a new like index repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Read a user's like index.
    pub async fn find(&self, user_id: &str) -> AppResult<LikeIndex> {
        match UserLikes::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?
        {
            Some(model) => LikeIndex::from_model(&model),
            None => Ok(LikeIndex::default()),
        }
    }

    /// Read a user's like index inside a transaction.
    pub async fn find_tx(&self, txn: &DatabaseTransaction, user_id: &str) -> AppResult<LikeIndex> {
        match UserLikes::find_by_id(user_id)
            .one(txn)
            .await
            .map_err(db_err)?
        {
            Some(model) => LikeIndex::from_model(&model),
            None => Ok(LikeIndex::default()),
        }
    }

    /// Write a like index read earlier in the same transaction.
    ///
    /// Creates the row when the index had no version; otherwise updates it
    /// guarded by that version.
    pub async fn save_tx(
        &self,
        txn: &DatabaseTransaction,
        user_id: &str,
        index: &LikeIndex,
    ) -> AppResult<()> {
        let ids = encode_json(&index.post_ids, "like index")?;
        match index.version {
            None => {
                user_likes::ActiveModel {
                    user_id: Set(user_id.to_string()),
                    liked_post_ids: Set(ids),
                    version: Set(0),
                }
                .insert(txn)
                .await
                .map_err(|e| crate::map_write_err("like index", e))?;
                Ok(())
            }
            Some(version) => expect_one(
                UserLikes::update_many()
                    .col_expr(user_likes::Column::LikedPostIds, Expr::value(ids))
                    .col_expr(user_likes::Column::Version, Expr::value(version + 1))
                    .filter(user_likes::Column::UserId.eq(user_id))
                    .filter(user_likes::Column::Version.eq(version))
                    .exec(txn)
                    .await,
                "like index",
            ),
        }
    }

    /// A page of like indexes ordered by owner, starting after `after_user_id`.
    pub async fn scan_page(
        &self,
        after_user_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<user_likes::Model>> {
        let mut query = UserLikes::find().order_by_asc(user_likes::Column::UserId);
        if let Some(after) = after_user_id {
            query = query.filter(user_likes::Column::UserId.gt(after));
        }
        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::run_transaction;
    use crate::test_utils::TestDatabase;

    #[tokio::test]
    async fn test_save_creates_then_updates() {
        let db = TestDatabase::new().await.unwrap();
        let repo = UserLikesRepository::new(db.shared());

        assert_eq!(repo.find("u1").await.unwrap(), LikeIndex::default());

        run_transaction(&db.conn, 1, |txn| {
            let repo = repo.clone();
            Box::pin(async move {
                let mut index = repo.find_tx(txn, "u1").await?;
                index.post_ids.insert("p1".to_string());
                repo.save_tx(txn, "u1", &index).await
            })
        })
        .await
        .unwrap();

        run_transaction(&db.conn, 1, |txn| {
            let repo = repo.clone();
            Box::pin(async move {
                let mut index = repo.find_tx(txn, "u1").await?;
                index.post_ids.insert("p2".to_string());
                repo.save_tx(txn, "u1", &index).await
            })
        })
        .await
        .unwrap();

        let index = repo.find("u1").await.unwrap();
        assert_eq!(index.version, Some(1));
        assert!(index.post_ids.contains("p1") && index.post_ids.contains("p2"));
    }

    #[tokio::test]
    async fn test_scan_page_walks_owners_in_order() {
        let db = TestDatabase::new().await.unwrap();
        let repo = UserLikesRepository::new(db.shared());

        for user in ["a", "b", "c"] {
            run_transaction(&db.conn, 1, |txn| {
                let repo = repo.clone();
                Box::pin(async move { repo.save_tx(txn, user, &LikeIndex::default()).await })
            })
            .await
            .unwrap();
        }

        let first = repo.scan_page(None, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        let rest = repo.scan_page(Some(&first[1].user_id), 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].user_id, "c");
    }
}
