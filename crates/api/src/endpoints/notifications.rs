//! Notification endpoints.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use companion_common::AppResult;
use companion_db::entities::notification::{Model as NotificationModel, NotificationType};
use serde::Serialize;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Notification response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub message: String,
    pub date: String,
    pub read: bool,
}

impl From<NotificationModel> for NotificationResponse {
    fn from(n: NotificationModel) -> Self {
        Self {
            id: n.id,
            notification_type: n.notification_type,
            message: n.message,
            date: n.date.to_rfc3339(),
            read: n.is_read,
        }
    }
}

/// Unread count response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: u64,
}

/// Mark-all response.
#[derive(Serialize)]
pub struct MarkedResponse {
    pub updated: u64,
}

/// The caller's notifications, newest first.
async fn list(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<NotificationResponse>>> {
    let notifications = state.notification_service.list(&identity.uid).await?;
    Ok(ApiResponse::ok(
        notifications.into_iter().map(Into::into).collect(),
    ))
}

/// Number of unread notifications.
async fn unread_count(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UnreadCountResponse>> {
    let unread_count = state
        .notification_service
        .unread_count(&identity.uid)
        .await?;
    Ok(ApiResponse::ok(UnreadCountResponse { unread_count }))
}

/// Mark one notification read.
async fn mark_read(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .notification_service
        .mark_as_read(&identity.uid, &notification_id)
        .await?;
    Ok(no_content())
}

/// Mark every notification read.
async fn mark_all_read(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<MarkedResponse>> {
    let updated = state
        .notification_service
        .mark_all_as_read(&identity.uid)
        .await?;
    Ok(ApiResponse::ok(MarkedResponse { updated }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/{notification_id}/read", post(mark_read))
}
