//! Navigation access checks.
//!
//! Clients ask before entering a guarded view and follow `redirect` when
//! `allow` is false.

use axum::{
    Router,
    extract::{Path, State},
    routing::get,
};
use companion_common::AppResult;
use companion_core::{
    GuardOutcome, Redirect, admin_guard, auth_guard, post_exists_guard, survey_guard,
};
use serde::Serialize;

use crate::{extractors::MaybeAuthUser, middleware::AppState, response::ApiResponse};

/// Guard decision.
#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
}

impl From<GuardOutcome> for AccessResponse {
    fn from(outcome: GuardOutcome) -> Self {
        Self {
            allow: outcome.is_allowed(),
            redirect: outcome.redirect(),
        }
    }
}

async fn auth(MaybeAuthUser(identity): MaybeAuthUser) -> AppResult<ApiResponse<AccessResponse>> {
    Ok(ApiResponse::ok(auth_guard(identity.as_ref()).into()))
}

async fn admin(MaybeAuthUser(identity): MaybeAuthUser) -> AppResult<ApiResponse<AccessResponse>> {
    Ok(ApiResponse::ok(admin_guard(identity.as_ref()).into()))
}

async fn survey(
    MaybeAuthUser(identity): MaybeAuthUser,
    State(state): State<AppState>,
    Path(survey_id): Path<String>,
) -> AppResult<ApiResponse<AccessResponse>> {
    let outcome = survey_guard(&state.survey_service, identity.as_ref(), &survey_id).await;
    Ok(ApiResponse::ok(outcome.into()))
}

async fn post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<AccessResponse>> {
    let outcome = post_exists_guard(&state.post_service, Some(post_id.as_str())).await;
    Ok(ApiResponse::ok(outcome.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth", get(auth))
        .route("/admin", get(admin))
        .route("/surveys/{survey_id}", get(survey))
        .route("/posts/{post_id}", get(post))
}
