//! Survey endpoints for respondents.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use companion_common::AppResult;
use companion_core::{SurveyDefinition, UserSurveyAnswers};
use serde::Deserialize;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Answer submission.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub responses: Vec<f64>,
}

/// Visible surveys.
async fn list(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<SurveyDefinition>>> {
    Ok(ApiResponse::ok(state.survey_service.list_visible().await?))
}

/// Visible surveys the caller has not completed.
async fn incomplete(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<SurveyDefinition>>> {
    Ok(ApiResponse::ok(
        state.survey_service.get_incomplete(&identity.uid).await?,
    ))
}

/// The caller's answers document.
async fn answers(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserSurveyAnswers>> {
    Ok(ApiResponse::ok(
        state.survey_service.get_user_answers(&identity.uid).await?,
    ))
}

/// A survey definition.
async fn show(
    State(state): State<AppState>,
    Path(survey_id): Path<String>,
) -> AppResult<ApiResponse<SurveyDefinition>> {
    Ok(ApiResponse::ok(
        state.survey_service.get_definition(&survey_id).await?,
    ))
}

/// Submit answers to a survey.
async fn submit(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(survey_id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> AppResult<StatusCode> {
    state
        .survey_service
        .submit_answers(&identity.uid, &survey_id, req.responses)
        .await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/incomplete", get(incomplete))
        .route("/answers", get(answers))
        .route("/{survey_id}", get(show))
        .route("/{survey_id}/answers", post(submit))
}
