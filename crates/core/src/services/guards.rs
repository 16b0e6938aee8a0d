//! Access guards.
//!
//! Each guard decides one navigation attempt from a single snapshot of the
//! current identity and at most one store read. A guard never subscribes to
//! anything, so nothing outlives the decision.

use serde::Serialize;
use tracing::{debug, warn};

use crate::services::identity::Identity;
use crate::services::post::PostService;
use crate::services::survey::SurveyService;

/// Where a denied navigation is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Redirect {
    Login,
    Profile,
    NotFound,
}

/// Outcome of a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect(Redirect),
}

impl GuardOutcome {
    /// Whether navigation may proceed.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Redirect target of a denied navigation.
    #[must_use]
    pub const fn redirect(self) -> Option<Redirect> {
        match self {
            Self::Allow => None,
            Self::Redirect(target) => Some(target),
        }
    }
}

/// Allow any signed-in identity.
#[must_use]
pub const fn auth_guard(identity: Option<&Identity>) -> GuardOutcome {
    match identity {
        Some(_) => GuardOutcome::Allow,
        None => GuardOutcome::Redirect(Redirect::Login),
    }
}

/// Allow identities carrying the admin claim.
#[must_use]
pub const fn admin_guard(identity: Option<&Identity>) -> GuardOutcome {
    match identity {
        Some(identity) if identity.is_admin => GuardOutcome::Allow,
        _ => GuardOutcome::Redirect(Redirect::Login),
    }
}

/// Allow a signed-in user who has not completed the survey yet.
pub async fn survey_guard(
    surveys: &SurveyService,
    identity: Option<&Identity>,
    survey_id: &str,
) -> GuardOutcome {
    let Some(identity) = identity else {
        return GuardOutcome::Redirect(Redirect::Profile);
    };
    if survey_id.is_empty() {
        return GuardOutcome::Redirect(Redirect::Profile);
    }

    match surveys.get_user_answers(&identity.uid).await {
        Ok(answers) if !answers.has_completed(survey_id) => GuardOutcome::Allow,
        Ok(_) => {
            debug!(uid = %identity.uid, survey_id = %survey_id, "Survey already completed");
            GuardOutcome::Redirect(Redirect::Profile)
        }
        Err(e) => {
            warn!(uid = %identity.uid, error = %e, "Survey guard could not read answers");
            GuardOutcome::Redirect(Redirect::Profile)
        }
    }
}

/// Allow navigation to an existing post.
pub async fn post_exists_guard(posts: &PostService, post_id: Option<&str>) -> GuardOutcome {
    let Some(post_id) = post_id.filter(|id| !id.is_empty()) else {
        return GuardOutcome::Redirect(Redirect::NotFound);
    };

    match posts.exists(post_id).await {
        Ok(true) => GuardOutcome::Allow,
        Ok(false) => GuardOutcome::Redirect(Redirect::NotFound),
        Err(e) => {
            warn!(post_id = %post_id, error = %e, "Post guard could not read post");
            GuardOutcome::Redirect(Redirect::NotFound)
        }
    }
}
