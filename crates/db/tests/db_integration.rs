//! Database integration tests.
//!
//! Run against a fresh in-memory SQLite database per test.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use companion_common::AppError;
use companion_db::entities::{comment, post};
use companion_db::repositories::{
    CommentRepository, MailRepository, PostRepository, SurveyRepository, UserLikesRepository,
};
use companion_db::run_transaction;
use companion_db::test_utils::TestDatabase;
use sea_orm::Set;
use serde_json::json;

fn post_model(id: &str) -> post::ActiveModel {
    post::ActiveModel {
        id: Set(id.to_string()),
        title: Set("Title".to_string()),
        content: Set("Content".to_string()),
        author_id: Set("author".to_string()),
        username: Set("author".to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
        hashtags: Set(json!([])),
        comment_count: Set(0),
        like_count: Set(0),
        is_edited: Set(false),
        is_locked: Set(false),
        linked_pictures: Set(json!([])),
        version: Set(0),
    }
}

fn comment_model(id: &str, post_id: &str) -> comment::ActiveModel {
    comment::ActiveModel {
        id: Set(id.to_string()),
        post_id: Set(post_id.to_string()),
        author_id: Set("commenter".to_string()),
        username: Set("commenter".to_string()),
        content: Set("hi".to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
        is_locked: Set(false),
        is_edited: Set(false),
        is_hidden: Set(false),
    }
}

#[tokio::test]
async fn test_post_delete_with_comments_is_atomic() {
    let db = TestDatabase::new().await.unwrap();
    let posts = PostRepository::new(db.shared());
    let comments = CommentRepository::new(db.shared());

    posts.create(post_model("p1")).await.unwrap();
    run_transaction(&db.conn, 1, |txn| {
        let comments = comments.clone();
        Box::pin(async move {
            comments.create_tx(txn, comment_model("c1", "p1")).await?;
            comments.create_tx(txn, comment_model("c2", "p1")).await?;
            Ok(())
        })
    })
    .await
    .unwrap();

    run_transaction(&db.conn, 1, |txn| {
        let posts = posts.clone();
        let comments = comments.clone();
        Box::pin(async move {
            let removed = comments.delete_by_post_tx(txn, "p1").await?;
            assert_eq!(removed, 2);
            posts.delete_tx(txn, "p1", 0).await
        })
    })
    .await
    .unwrap();

    assert!(posts.find_by_id("p1").await.unwrap().is_none());
    assert!(comments.find_by_post("p1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_transaction_leaves_no_partial_writes() {
    let db = TestDatabase::new().await.unwrap();
    let posts = PostRepository::new(db.shared());
    let comments = CommentRepository::new(db.shared());
    posts.create(post_model("p1")).await.unwrap();

    let result: Result<(), AppError> = run_transaction(&db.conn, 1, |txn| {
        let comments = comments.clone();
        Box::pin(async move {
            comments.create_tx(txn, comment_model("c1", "p1")).await?;
            Err(AppError::Locked("post".to_string()))
        })
    })
    .await;

    assert!(matches!(result, Err(AppError::Locked(_))));
    assert!(comments.find_by_id("c1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_index_creation_conflicts_then_retries() {
    let db = TestDatabase::new().await.unwrap();
    let likes = UserLikesRepository::new(db.shared());

    // Both attempts read "no index"; the second insert hits the primary key.
    run_transaction(&db.conn, 1, |txn| {
        let likes = likes.clone();
        Box::pin(async move {
            let index = likes.find_tx(txn, "u1").await?;
            likes.save_tx(txn, "u1", &index).await
        })
    })
    .await
    .unwrap();

    let stale = companion_db::repositories::LikeIndex::default();
    let result = run_transaction(&db.conn, 2, |txn| {
        let likes = likes.clone();
        let stale = stale.clone();
        Box::pin(async move { likes.save_tx(txn, "u1", &stale).await })
    })
    .await;
    assert!(matches!(result, Err(AppError::RetriesExhausted(2))));
}

#[tokio::test]
async fn test_survey_answers_scan_and_mail_batch() {
    let db = TestDatabase::new().await.unwrap();
    let surveys = SurveyRepository::new(db.shared());
    let mails = MailRepository::new(db.shared());

    for user in ["u1", "u2", "u3"] {
        run_transaction(&db.conn, 1, |txn| {
            let surveys = surveys.clone();
            Box::pin(async move { surveys.save_answers_tx(txn, user, None, json!({})).await })
        })
        .await
        .unwrap();
    }
    let page = surveys.scan_answers_page(Some("u1"), 10).await.unwrap();
    assert_eq!(page.len(), 2);

    let batch = ["a@example.com", "b@example.com"]
        .into_iter()
        .enumerate()
        .map(|(i, to)| companion_db::entities::mail::ActiveModel {
            id: Set(format!("m{i}")),
            to: Set(to.to_string()),
            subject: Set("Hello".to_string()),
            html: Set("<p>Hello</p>".to_string()),
            created_at: Set(Utc::now().into()),
        })
        .collect();
    assert_eq!(mails.enqueue_batch(batch).await.unwrap(), 2);
    assert_eq!(mails.find_all().await.unwrap().len(), 2);
}
