//! Admin endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use companion_common::AppResult;
use companion_core::{BroadcastMailInput, CreateSurveyInput, SurveyDefinition, SurveyStatistics};
use serde::{Deserialize, Serialize};

use super::auth::UserResponse;
use super::comments::HiddenRequest;
use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// User search query.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub prefix: String,
}

/// Account status request.
#[derive(Debug, Deserialize)]
pub struct DisabledRequest {
    pub disabled: bool,
}

/// Broadcast result.
#[derive(Serialize)]
pub struct BroadcastResponse {
    pub queued: usize,
}

async fn search_users(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<ApiResponse<Vec<UserResponse>>> {
    let users = state
        .admin_service
        .search_users(&identity, &query.prefix)
        .await?;
    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}

async fn set_disabled(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(req): Json<DisabledRequest>,
) -> AppResult<StatusCode> {
    state
        .admin_service
        .set_user_disabled(&identity, &uid, req.disabled)
        .await?;
    Ok(no_content())
}

async fn grant_admin(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<StatusCode> {
    state.admin_service.grant_admin(&identity, &uid).await?;
    Ok(no_content())
}

/// Queue a mail to every user.
async fn broadcast_mail(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<BroadcastMailInput>,
) -> AppResult<ApiResponse<BroadcastResponse>> {
    let queued = state
        .admin_service
        .send_email_to_all(&identity, req)
        .await?;
    Ok(ApiResponse::ok(BroadcastResponse { queued }))
}

/// Every survey, hidden ones included.
async fn list_surveys(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<SurveyDefinition>>> {
    Ok(ApiResponse::ok(
        state.survey_service.list_all(&identity).await?,
    ))
}

async fn create_survey(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateSurveyInput>,
) -> AppResult<ApiResponse<SurveyDefinition>> {
    Ok(ApiResponse::ok(
        state
            .survey_service
            .create_definition(&identity, req)
            .await?,
    ))
}

async fn set_survey_hidden(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(survey_id): Path<String>,
    Json(req): Json<HiddenRequest>,
) -> AppResult<StatusCode> {
    state
        .survey_service
        .set_hidden(&identity, &survey_id, req.hidden)
        .await?;
    Ok(no_content())
}

/// Mean and standard deviation per question.
async fn survey_statistics(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(survey_id): Path<String>,
) -> AppResult<ApiResponse<SurveyStatistics>> {
    Ok(ApiResponse::ok(
        state
            .survey_service
            .get_statistics(&identity, &survey_id)
            .await?,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(search_users))
        .route("/users/{uid}/disabled", post(set_disabled))
        .route("/users/{uid}/admin", post(grant_admin))
        .route("/mail", post(broadcast_mail))
        .route("/surveys", get(list_surveys).post(create_survey))
        .route("/surveys/{survey_id}/hidden", post(set_survey_hidden))
        .route("/surveys/{survey_id}/statistics", get(survey_statistics))
}
