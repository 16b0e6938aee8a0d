//! Authentication endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
};
use companion_common::{AppError, AppResult};
use companion_core::{AuthenticatedUser, RegisterInput};
use companion_db::entities::app_user;
use serde::{Deserialize, Serialize};

use super::read_images;
use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// User document response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub photo_url: String,
    pub disabled: bool,
    pub created_at: String,
}

impl From<app_user::Model> for UserResponse {
    fn from(u: app_user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            photo_url: u.photo_url,
            disabled: u.disabled,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// Signed-in response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub is_admin: bool,
    pub user: UserResponse,
}

impl From<AuthenticatedUser> for SessionResponse {
    fn from(a: AuthenticatedUser) -> Self {
        Self {
            token: a.token,
            is_admin: a.identity.is_admin,
            user: a.user.into(),
        }
    }
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Password reset request.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Password reset confirmation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetConfirmRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Profile picture response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoResponse {
    pub photo_url: String,
}

/// Create a new account.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterInput>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let registered = state.auth_service.register(req).await?;
    Ok(ApiResponse::ok(registered.into()))
}

/// Sign in to an existing account.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let signed_in = state.auth_service.login(&req.email, &req.password).await?;
    Ok(ApiResponse::ok(signed_in.into()))
}

/// Sign out.
async fn logout(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    state.auth_service.logout(&identity.uid).await?;
    Ok(no_content())
}

/// The caller's user document.
async fn me(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.auth_service.get_user(&identity.uid).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Mail a password reset code.
async fn request_reset(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> AppResult<StatusCode> {
    state.auth_service.request_password_reset(&req.email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Set a new password with a reset code.
async fn confirm_reset(
    State(state): State<AppState>,
    Json(req): Json<ResetConfirmRequest>,
) -> AppResult<StatusCode> {
    state
        .auth_service
        .confirm_password_reset(&req.email, &req.code, &req.new_password)
        .await?;
    Ok(no_content())
}

/// Replace the caller's profile picture.
async fn profile_picture(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<PhotoResponse>> {
    let image = read_images(multipart)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let photo_url = state
        .auth_service
        .update_profile_picture(&identity.uid, &image.data, &image.content_type)
        .await?;
    Ok(ApiResponse::ok(PhotoResponse { photo_url }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password-reset", post(request_reset))
        .route("/password-reset/confirm", post(confirm_reset))
        .route("/profile-picture", post(profile_picture))
}
