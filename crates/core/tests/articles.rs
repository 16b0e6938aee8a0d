//! Article publishing tests.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use companion_common::{AppError, BlobStore, IdGenerator, LocalBlobStore};
use companion_core::{
    ArticleBlock, ArticleBlockInput, ArticleService, BroadcastEventPublisher, CreateArticleInput,
    EventPublisher, Identity, ImageUpload, StoreEvent,
};
use companion_db::test_utils::TestDatabase;

struct Newsroom {
    _db: TestDatabase,
    articles: ArticleService,
    events: Arc<BroadcastEventPublisher>,
    blob_dir: PathBuf,
}

async fn newsroom() -> Newsroom {
    let db = TestDatabase::new().await.unwrap();
    let events = Arc::new(BroadcastEventPublisher::new());
    let blob_dir = std::env::temp_dir().join(format!(
        "companion-articles-{}",
        IdGenerator::new().generate_blob_name()
    ));
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        blob_dir.clone(),
        "http://localhost/files".to_string(),
    ));

    Newsroom {
        articles: ArticleService::new(db.shared(), blobs, events.clone()),
        events,
        blob_dir,
        _db: db,
    }
}

fn admin() -> Identity {
    Identity {
        uid: "admin".into(),
        email: "admin@example.com".into(),
        is_admin: true,
    }
}

fn player() -> Identity {
    Identity {
        uid: "player".into(),
        email: "player@example.com".into(),
        is_admin: false,
    }
}

fn image(content_type: &str) -> ImageUpload {
    ImageUpload {
        data: vec![0x89, 0x50, 0x4e, 0x47],
        content_type: content_type.to_string(),
    }
}

fn patch_notes(title: &str) -> CreateArticleInput {
    CreateArticleInput {
        title: title.to_string(),
        thumbnail: image("image/png"),
        blocks: vec![
            ArticleBlockInput::Text("New season".into()),
            ArticleBlockInput::Image(image("image/jpeg")),
            ArticleBlockInput::Text("Balance changes".into()),
            ArticleBlockInput::Image(image("image/png")),
        ],
    }
}

#[tokio::test]
async fn test_publish_and_read_article() {
    let room = newsroom().await;
    let mut feed = room.events.subscribe();

    let article = room
        .articles
        .create(&admin(), patch_notes("  Patch 3.1  "))
        .await
        .unwrap();
    assert_eq!(article.title, "Patch 3.1");
    assert_eq!(
        article.thumbnail_url,
        format!("http://localhost/files/articles/{}/thumbnail.png", article.id)
    );
    assert_eq!(
        article.blocks,
        vec![
            ArticleBlock::Text {
                text: "New season".into()
            },
            ArticleBlock::Image {
                url: format!("http://localhost/files/articles/{}/images/1.jpg", article.id)
            },
            ArticleBlock::Text {
                text: "Balance changes".into()
            },
            ArticleBlock::Image {
                url: format!("http://localhost/files/articles/{}/images/3.png", article.id)
            },
        ]
    );
    let stored = room.blob_dir.join("articles").join(&article.id);
    assert!(stored.join("thumbnail.png").exists());
    assert!(stored.join("images").join("1.jpg").exists());
    assert_eq!(feed.recv().await.unwrap(), StoreEvent::ArticlesChanged);

    assert_eq!(room.articles.get(&article.id).await.unwrap(), article);
    assert_eq!(room.articles.latest().await.unwrap(), vec![article]);
}

#[tokio::test]
async fn test_only_admins_publish_and_delete() {
    let room = newsroom().await;

    let err = room
        .articles
        .create(&player(), patch_notes("Leak"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(!room.blob_dir.join("articles").exists());

    let article = room
        .articles
        .create(&admin(), patch_notes("Patch 3.2"))
        .await
        .unwrap();
    let err = room
        .articles
        .delete(&player(), &article.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(room.articles.get(&article.id).await.is_ok());
}

#[tokio::test]
async fn test_blank_title_uploads_nothing() {
    let room = newsroom().await;

    let err = room
        .articles
        .create(&admin(), patch_notes(" \t "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(!room.blob_dir.join("articles").exists());
    assert!(room.articles.latest().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_removes_row_and_blobs() {
    let room = newsroom().await;
    let article = room
        .articles
        .create(&admin(), patch_notes("Patch 3.3"))
        .await
        .unwrap();
    let stored = room.blob_dir.join("articles").join(&article.id);
    assert!(stored.exists());

    room.articles.delete(&admin(), &article.id).await.unwrap();
    assert!(!stored.join("thumbnail.png").exists());
    assert!(!stored.join("images").join("3.png").exists());
    assert!(matches!(
        room.articles.get(&article.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
    assert!(matches!(
        room.articles.delete(&admin(), &article.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
}
