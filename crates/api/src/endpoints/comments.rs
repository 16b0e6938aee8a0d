//! Comment endpoints, nested under a post.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use companion_common::AppResult;
use companion_core::CommentInput;
use companion_db::entities::comment;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Comment response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub username: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_locked: bool,
    pub is_edited: bool,
    pub is_hidden: bool,
}

impl From<comment::Model> for CommentResponse {
    fn from(c: comment::Model) -> Self {
        Self {
            id: c.id,
            post_id: c.post_id,
            author_id: c.author_id,
            username: c.username,
            content: c.content,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
            is_locked: c.is_locked,
            is_edited: c.is_edited,
            is_hidden: c.is_hidden,
        }
    }
}

/// Visibility change request.
#[derive(Debug, Deserialize)]
pub struct HiddenRequest {
    pub hidden: bool,
}

/// Comments of a post, newest first.
async fn list(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state.comment_service.list(&post_id).await?;
    Ok(ApiResponse::ok(comments.into_iter().map(Into::into).collect()))
}

/// Comment on a post.
async fn create(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<CommentInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let created = state
        .comment_service
        .create(&identity, &post_id, req)
        .await?;
    Ok(ApiResponse::ok(created.into()))
}

/// Edit a comment.
async fn edit(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(String, String)>,
    Json(req): Json<CommentInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let edited = state
        .comment_service
        .edit(&identity, &post_id, &comment_id, req)
        .await?;
    Ok(ApiResponse::ok(edited.into()))
}

/// Delete a comment.
async fn delete(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .comment_service
        .delete(&identity, &post_id, &comment_id)
        .await?;
    Ok(no_content())
}

/// Hide or show a comment.
async fn set_hidden(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(String, String)>,
    Json(req): Json<HiddenRequest>,
) -> AppResult<StatusCode> {
    state
        .comment_service
        .set_hidden(&identity, &post_id, &comment_id, req.hidden)
        .await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{post_id}/comments", get(list).post(create))
        .route(
            "/{post_id}/comments/{comment_id}",
            patch(edit).delete(delete),
        )
        .route("/{post_id}/comments/{comment_id}/hidden", post(set_hidden))
}
