//! Account service: registration, login, logout, password reset, profile picture.

use std::sync::Arc;

use chrono::Utc;
use companion_common::{AppError, AppResult, BlobStore, image_extension};
use companion_db::{entities::app_user, repositories::UserRepository};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::services::identity::{Identity, IdentityProviderService};
use crate::services::mail::MailService;
use crate::services::session::Session;

/// Input for registering a new account.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 128))]
    pub password: String,

    #[validate(length(min = 1, max = 64))]
    pub username: String,
}

/// A signed-in user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    pub user: app_user::Model,
    pub token: String,
}

/// Account service for business logic.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<DatabaseConnection>,
    user_repo: UserRepository,
    identity: IdentityProviderService,
    mail: MailService,
    blobs: Arc<dyn BlobStore>,
    default_photo_url: String,
}

impl AuthService {
    /// Create a new account service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        identity: IdentityProviderService,
        mail: MailService,
        blobs: Arc<dyn BlobStore>,
        default_photo_url: String,
    ) -> Self {
        Self {
            user_repo: UserRepository::new(db.clone()),
            db,
            identity,
            mail,
            blobs,
            default_photo_url,
        }
    }

    /// Register a new account and its user document.
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthenticatedUser> {
        input.validate()?;

        let signed_in = self.identity.sign_up(&input.email, &input.password).await?;

        let model = app_user::ActiveModel {
            id: Set(signed_in.identity.uid.clone()),
            email: Set(signed_in.identity.email.clone()),
            username: Set(input.username.trim().to_string()),
            photo_url: Set(self.default_photo_url.clone()),
            disabled: Set(false),
            created_at: Set(Utc::now().into()),
        };

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let user = self.user_repo.create_tx(&txn, model).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        info!(uid = %user.id, username = %user.username, "User registered");

        Ok(AuthenticatedUser {
            identity: signed_in.identity,
            user,
            token: signed_in.token,
        })
    }

    /// Sign in.
    ///
    /// The identity provider checks the password; the user document is then
    /// read, and a disabled account is signed out again and rejected.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthenticatedUser> {
        let signed_in = self.identity.sign_in(email, password).await?;
        let uid = signed_in.identity.uid.clone();

        let user = match self.user_repo.find_by_id(&uid).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.identity.sign_out(&uid).await?;
                return Err(AppError::UserNotFound(uid));
            }
            Err(e) => {
                self.identity.sign_out(&uid).await?;
                return Err(e);
            }
        };

        if user.disabled {
            self.identity.sign_out(&uid).await?;
            warn!(uid = %uid, "Login attempt on disabled account");
            return Err(AppError::AccountDisabled);
        }

        info!(uid = %uid, "User logged in");
        Ok(AuthenticatedUser {
            identity: signed_in.identity,
            user,
            token: signed_in.token,
        })
    }

    /// Sign out.
    pub async fn logout(&self, uid: &str) -> AppResult<()> {
        self.identity.sign_out(uid).await?;
        info!(uid = %uid, "User logged out");
        Ok(())
    }

    /// Sign in and record the identity on a client session.
    pub async fn login_session(
        &self,
        session: &Session,
        email: &str,
        password: &str,
    ) -> AppResult<AuthenticatedUser> {
        let authenticated = self.login(email, password).await?;
        session.sign_in(authenticated.identity.clone());
        Ok(authenticated)
    }

    /// Sign out the session's identity, if any, and clear it.
    pub async fn logout_session(&self, session: &Session) -> AppResult<()> {
        if let Some(identity) = session.current() {
            self.logout(&identity.uid).await?;
        }
        session.sign_out();
        Ok(())
    }

    /// Resolve a bearer token.
    pub async fn authenticate(&self, token: &str) -> AppResult<Option<Identity>> {
        self.identity.resolve_token(token).await
    }

    /// Get a user document.
    pub async fn get_user(&self, uid: &str) -> AppResult<app_user::Model> {
        self.user_repo
            .find_by_id(uid)
            .await?
            .ok_or_else(|| AppError::UserNotFound(uid.to_string()))
    }

    /// Mail a reset code. Unknown addresses succeed silently.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        if let Some(reset) = self.identity.request_password_reset(email).await? {
            self.mail.send_password_reset(&reset.email, &reset.code).await?;
            info!(uid = %reset.uid, "Password reset requested");
        }
        Ok(())
    }

    /// Set a new password using a mailed reset code.
    pub async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> AppResult<()> {
        self.identity
            .confirm_password_reset(email, code, new_password)
            .await
    }

    /// Upload a new profile picture and store its URL.
    pub async fn update_profile_picture(
        &self,
        uid: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<String> {
        self.get_user(uid).await?;

        let path = format!("profiles/{uid}/profilePic.{}", image_extension(content_type));
        let blob = self.blobs.upload(&path, data, content_type).await?;
        self.user_repo.set_photo_url(uid, &blob.url).await?;

        info!(uid = %uid, path = %blob.path, "Profile picture updated");
        Ok(blob.url)
    }
}
