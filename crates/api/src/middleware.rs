//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use companion_core::{
    AdminService, ArticleService, AuthService, CommentService, EventPublisherService,
    LikeService, NotificationService, PostService, SurveyService,
};
use tracing::warn;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub like_service: LikeService,
    pub notification_service: NotificationService,
    pub survey_service: SurveyService,
    pub admin_service: AdminService,
    pub article_service: ArticleService,
    pub event_publisher: EventPublisherService,
}

/// Authentication middleware.
///
/// Resolves a `Bearer` token to an [`companion_core::Identity`] and stores it
/// in the request extensions. Requests without a valid token pass through
/// anonymously.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.auth_service.authenticate(token).await {
            Ok(Some(identity)) => {
                req.extensions_mut().insert(identity);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Token lookup failed"),
        }
    }

    next.run(req).await
}
