//! API endpoints.

mod access;
mod admin;
mod articles;
mod auth;
mod comments;
mod notifications;
mod posts;
mod surveys;
mod users;

use axum::{
    Router,
    extract::{Multipart, multipart::Field},
};
use companion_common::{AppError, AppResult};
use companion_core::ImageUpload;

use crate::middleware::AppState;
use crate::sse;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/posts", posts::router().merge(comments::router()))
        .nest("/users", users::router())
        .nest("/notifications", notifications::router())
        .nest("/surveys", surveys::router())
        .nest("/articles", articles::router())
        .nest("/admin", admin::router())
        .nest("/access", access::router())
        .nest("/stream", sse::router())
}

/// Read every `file` field of a multipart body as an image.
async fn read_images(mut multipart: Multipart) -> AppResult<Vec<ImageUpload>> {
    let mut images = Vec::new();

    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() != Some("file") {
            continue;
        }
        images.push(read_image(field).await?);
    }

    Ok(images)
}

async fn next_field(multipart: &mut Multipart) -> AppResult<Option<Field<'_>>> {
    multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Read one multipart field as an image, rejecting non-image content types.
async fn read_image(field: Field<'_>) -> AppResult<ImageUpload> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(AppError::BadRequest(format!(
            "Unsupported file type: {content_type}"
        )));
    }
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .to_vec();
    Ok(ImageUpload { data, content_type })
}
