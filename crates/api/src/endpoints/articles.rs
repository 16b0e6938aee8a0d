//! Article endpoints.
//!
//! Publishing takes a multipart body: a `title` text field, a `thumbnail`
//! image, then the body blocks in order as `text` fields and `image` files.

use axum::{
    Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::get,
};
use companion_common::{AppError, AppResult};
use companion_core::{Article, ArticleBlockInput, CreateArticleInput};

use super::{next_field, read_image};
use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

async fn latest(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<Article>>> {
    Ok(ApiResponse::ok(state.article_service.latest().await?))
}

async fn show(
    State(state): State<AppState>,
    Path(article_id): Path<String>,
) -> AppResult<ApiResponse<Article>> {
    Ok(ApiResponse::ok(state.article_service.get(&article_id).await?))
}

/// Publish an article.
async fn create(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<Article>> {
    let input = read_article(multipart).await?;
    Ok(ApiResponse::ok(
        state.article_service.create(&identity, input).await?,
    ))
}

/// Delete an article and its images.
async fn delete(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(article_id): Path<String>,
) -> AppResult<StatusCode> {
    state.article_service.delete(&identity, &article_id).await?;
    Ok(no_content())
}

async fn read_article(mut multipart: Multipart) -> AppResult<CreateArticleInput> {
    let mut title = None;
    let mut thumbnail = None;
    let mut blocks = Vec::new();

    while let Some(field) = next_field(&mut multipart).await? {
        match field.name() {
            Some("title") => title = Some(read_text(field).await?),
            Some("thumbnail") => thumbnail = Some(read_image(field).await?),
            Some("text") => blocks.push(ArticleBlockInput::Text(read_text(field).await?)),
            Some("image") => blocks.push(ArticleBlockInput::Image(read_image(field).await?)),
            _ => {}
        }
    }

    Ok(CreateArticleInput {
        title: title.ok_or_else(|| AppError::BadRequest("Missing title".to_string()))?,
        thumbnail: thumbnail
            .ok_or_else(|| AppError::BadRequest("Missing thumbnail".to_string()))?,
        blocks,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(latest).post(create))
        .route("/{article_id}", get(show).delete(delete))
}
