//! Admin service.

use companion_common::{AppError, AppResult};
use companion_db::{entities::app_user, repositories::UserRepository};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::services::identity::{Identity, IdentityProviderService};
use crate::services::mail::MailService;

/// Maximum number of users a search returns.
pub const USER_SEARCH_LIMIT: u64 = 10;

/// A mail sent to every user.
#[derive(Debug, Deserialize, Validate)]
pub struct BroadcastMailInput {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,

    #[validate(length(min = 1))]
    pub html: String,
}

/// Admin service for business logic.
#[derive(Clone)]
pub struct AdminService {
    user_repo: UserRepository,
    identity: IdentityProviderService,
    mail: MailService,
}

impl AdminService {
    /// Create a new admin service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        identity: IdentityProviderService,
        mail: MailService,
    ) -> Self {
        Self {
            user_repo,
            identity,
            mail,
        }
    }

    /// Users whose name starts with `prefix`, ordered by name.
    pub async fn search_users(
        &self,
        actor: &Identity,
        prefix: &str,
    ) -> AppResult<Vec<app_user::Model>> {
        actor.require_admin()?;
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        self.user_repo
            .search_by_username_prefix(prefix, USER_SEARCH_LIMIT)
            .await
    }

    /// Enable or disable an account.
    pub async fn set_user_disabled(
        &self,
        actor: &Identity,
        uid: &str,
        disabled: bool,
    ) -> AppResult<()> {
        actor.require_admin()?;
        if uid == actor.uid && disabled {
            return Err(AppError::BadRequest(
                "Admins cannot disable their own account".to_string(),
            ));
        }
        if !self.user_repo.set_disabled(uid, disabled).await? {
            return Err(AppError::UserNotFound(uid.to_string()));
        }
        if disabled {
            self.identity.sign_out(uid).await?;
        }
        info!(uid = %uid, disabled, admin = %actor.uid, "Account status changed");
        Ok(())
    }

    /// Give an account the admin claim.
    pub async fn grant_admin(&self, actor: &Identity, uid: &str) -> AppResult<()> {
        actor.require_admin()?;
        self.identity.set_admin_claim(uid, true).await?;
        info!(uid = %uid, admin = %actor.uid, "Admin claim granted");
        Ok(())
    }

    /// Queue a mail to every distinct user address. Returns the number queued.
    pub async fn send_email_to_all(
        &self,
        actor: &Identity,
        input: BroadcastMailInput,
    ) -> AppResult<usize> {
        actor.require_admin()?;
        input.validate()?;
        let emails = self.user_repo.find_all_emails().await?;
        self.mail
            .enqueue_to_all(&emails, &input.subject, &input.html)
            .await
    }
}
