//! Post and like endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use companion_common::AppResult;
use companion_core::{CreatePostInput, EditPostInput, Post, PostSearch};
use serde::{Deserialize, Serialize};

use super::read_images;
use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Image removal request.
#[derive(Debug, Deserialize)]
pub struct RemoveImageRequest {
    pub url: String,
}

/// Lock toggle response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockResponse {
    pub is_locked: bool,
}

/// Like toggle response.
#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
}

/// The newest posts.
async fn latest(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<Post>>> {
    Ok(ApiResponse::ok(state.post_service.latest().await?))
}

/// Create a post.
async fn create(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePostInput>,
) -> AppResult<ApiResponse<Post>> {
    Ok(ApiResponse::ok(
        state.post_service.create(&identity, req).await?,
    ))
}

/// Filtered search.
async fn search(
    State(state): State<AppState>,
    Json(req): Json<PostSearch>,
) -> AppResult<ApiResponse<Vec<Post>>> {
    Ok(ApiResponse::ok(state.post_service.search(req).await?))
}

/// Get a post.
async fn show(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<Post>> {
    Ok(ApiResponse::ok(state.post_service.get(&post_id).await?))
}

/// Edit a post.
async fn edit(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<EditPostInput>,
) -> AppResult<ApiResponse<Post>> {
    Ok(ApiResponse::ok(
        state.post_service.edit(&identity, &post_id, req).await?,
    ))
}

/// Delete a post with its comments and images.
async fn delete(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<StatusCode> {
    state.post_service.delete(&identity, &post_id).await?;
    Ok(no_content())
}

/// Lock or unlock a post.
async fn toggle_lock(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<LockResponse>> {
    let is_locked = state.post_service.toggle_lock(&identity, &post_id).await?;
    Ok(ApiResponse::ok(LockResponse { is_locked }))
}

/// Attach uploaded images.
async fn attach_images(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    multipart: Multipart,
) -> AppResult<ApiResponse<Post>> {
    let images = read_images(multipart).await?;
    Ok(ApiResponse::ok(
        state
            .post_service
            .attach_images(&identity, &post_id, images)
            .await?,
    ))
}

/// Remove one image.
async fn remove_image(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<RemoveImageRequest>,
) -> AppResult<ApiResponse<Post>> {
    Ok(ApiResponse::ok(
        state
            .post_service
            .delete_image(&identity, &post_id, &req.url)
            .await?,
    ))
}

/// Like or unlike a post.
async fn toggle_like(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<LikeResponse>> {
    let liked = state
        .like_service
        .toggle_like(&identity.uid, &post_id)
        .await?;
    Ok(ApiResponse::ok(LikeResponse { liked }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(latest).post(create))
        .route("/search", post(search))
        .route("/{post_id}", get(show).patch(edit).delete(delete))
        .route("/{post_id}/lock", post(toggle_lock))
        .route(
            "/{post_id}/images",
            post(attach_images).delete(remove_image),
        )
        .route("/{post_id}/like", post(toggle_like))
}
