//! Per-user listing endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::get,
};
use companion_common::AppResult;
use companion_core::Post;

use super::comments::CommentResponse;
use crate::{middleware::AppState, response::ApiResponse};

/// Posts written by a user.
async fn posts(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<ApiResponse<Vec<Post>>> {
    Ok(ApiResponse::ok(state.post_service.by_user(&uid).await?))
}

/// Comments written by a user.
async fn comments(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state.comment_service.by_user(&uid).await?;
    Ok(ApiResponse::ok(comments.into_iter().map(Into::into).collect()))
}

/// Ids of the posts a user likes.
async fn likes(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<ApiResponse<Vec<String>>> {
    Ok(ApiResponse::ok(state.like_service.liked_posts(&uid).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{uid}/posts", get(posts))
        .route("/{uid}/comments", get(comments))
        .route("/{uid}/likes", get(likes))
}
