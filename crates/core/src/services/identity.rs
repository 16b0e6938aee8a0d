//! Identity provider.
//!
//! Authentication is a collaborator behind the [`IdentityProvider`] trait.
//! [`LocalIdentityProvider`] keeps argon2 password hashes and opaque session
//! tokens in the credential table; the admin flag is a custom claim on the
//! credential.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use companion_common::{AppError, AppResult, IdGenerator};
use companion_db::entities::credential;
use companion_db::repositories::CredentialRepository;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Serialize;
use tracing::info;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    pub email: String,
    /// Custom admin claim.
    pub is_admin: bool,
}

impl Identity {
    /// Fail with `Forbidden` unless the admin claim is set.
    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }
}

/// Result of a successful sign-in or sign-up.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub identity: Identity,
    /// Bearer token for subsequent requests.
    pub token: String,
}

/// A password reset code issued to an account.
#[derive(Debug, Clone)]
pub struct ResetCode {
    pub uid: String,
    pub email: String,
    pub code: String,
}

/// Authentication collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<SignedIn>;

    /// Check credentials and start a session.
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<SignedIn>;

    /// End the session of `uid`.
    async fn sign_out(&self, uid: &str) -> AppResult<()>;

    /// Resolve a bearer token to its identity, `None` when unknown.
    async fn resolve_token(&self, token: &str) -> AppResult<Option<Identity>>;

    /// Set or clear the admin custom claim.
    async fn set_admin_claim(&self, uid: &str, is_admin: bool) -> AppResult<()>;

    /// Issue a reset code. `None` when no account has that email.
    async fn request_password_reset(&self, email: &str) -> AppResult<Option<ResetCode>>;

    /// Replace the password if the code matches and has not expired.
    async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> AppResult<()>;
}

/// Wrapper for boxed `IdentityProvider` trait object.
pub type IdentityProviderService = Arc<dyn IdentityProvider>;

/// Identity provider over the local credential table.
#[derive(Clone)]
pub struct LocalIdentityProvider {
    db: Arc<DatabaseConnection>,
    credential_repo: CredentialRepository,
    reset_code_ttl: Duration,
    id_gen: IdGenerator,
}

impl LocalIdentityProvider {
    /// Create a new local identity provider.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, reset_code_ttl_minutes: i64) -> Self {
        Self {
            credential_repo: CredentialRepository::new(db.clone()),
            db,
            reset_code_ttl: Duration::minutes(reset_code_ttl_minutes),
            id_gen: IdGenerator::new(),
        }
    }

    fn identity(model: &credential::Model) -> Identity {
        Identity {
            uid: model.uid.clone(),
            email: model.email.clone(),
            is_admin: model.is_admin,
        }
    }

    async fn start_session(&self, model: &credential::Model) -> AppResult<SignedIn> {
        let token = self.id_gen.generate_token();
        self.credential_repo
            .set_token(&model.uid, Some(&token))
            .await?;
        Ok(SignedIn {
            identity: Self::identity(model),
            token,
        })
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<SignedIn> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        if password.len() < 6 {
            return Err(AppError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        let model = credential::ActiveModel {
            uid: Set(self.id_gen.generate()),
            email: Set(email),
            password_hash: Set(hash_password(password)?),
            is_admin: Set(false),
            token: Set(None),
            reset_code: Set(None),
            reset_expires_at: Set(None),
            created_at: Set(Utc::now().into()),
        };

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let created = self.credential_repo.create_tx(&txn, model).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        info!(uid = %created.uid, "Identity created");
        self.start_session(&created).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<SignedIn> {
        let credential = self
            .credential_repo
            .find_by_email(email.trim())
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &credential.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        self.start_session(&credential).await
    }

    async fn sign_out(&self, uid: &str) -> AppResult<()> {
        self.credential_repo.set_token(uid, None).await
    }

    async fn resolve_token(&self, token: &str) -> AppResult<Option<Identity>> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self
            .credential_repo
            .find_by_token(token)
            .await?
            .as_ref()
            .map(Self::identity))
    }

    async fn set_admin_claim(&self, uid: &str, is_admin: bool) -> AppResult<()> {
        if !self.credential_repo.set_admin(uid, is_admin).await? {
            return Err(AppError::UserNotFound(uid.to_string()));
        }
        info!(uid = %uid, is_admin, "Admin claim updated");
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> AppResult<Option<ResetCode>> {
        let Some(credential) = self.credential_repo.find_by_email(email.trim()).await? else {
            return Ok(None);
        };

        let code = self.id_gen.generate_reset_code();
        let expires_at = Utc::now() + self.reset_code_ttl;
        self.credential_repo
            .set_reset_code(&credential.uid, &code, expires_at)
            .await?;

        Ok(Some(ResetCode {
            uid: credential.uid,
            email: credential.email,
            code,
        }))
    }

    async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let credential = self
            .credential_repo
            .find_by_email(email.trim())
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid reset code".to_string()))?;

        let valid = credential.reset_code.as_deref() == Some(code)
            && credential
                .reset_expires_at
                .is_some_and(|expires| expires > Utc::now());
        if !valid {
            return Err(AppError::BadRequest("Invalid reset code".to_string()));
        }
        if new_password.len() < 6 {
            return Err(AppError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        self.credential_repo
            .set_password(&credential.uid, &hash_password(new_password)?)
            .await?;
        info!(uid = %credential.uid, "Password reset");
        Ok(())
    }
}

/// Hash a password with argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use companion_db::test_utils::TestDatabase;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_sign_up_sign_in_and_token_resolution() {
        let db = TestDatabase::new().await.unwrap();
        let idp = LocalIdentityProvider::new(db.shared(), 60);

        let signed_up = idp.sign_up("Alice@Example.com", "secret1").await.unwrap();
        assert_eq!(signed_up.identity.email, "alice@example.com");
        assert!(!signed_up.identity.is_admin);

        let duplicate = idp.sign_up("alice@example.com", "secret1").await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let wrong = idp.sign_in("alice@example.com", "nope").await;
        assert!(matches!(wrong, Err(AppError::Unauthorized)));

        let signed_in = idp.sign_in("alice@example.com", "secret1").await.unwrap();
        let resolved = idp.resolve_token(&signed_in.token).await.unwrap().unwrap();
        assert_eq!(resolved.uid, signed_up.identity.uid);

        idp.set_admin_claim(&resolved.uid, true).await.unwrap();
        assert!(idp.resolve_token(&signed_in.token).await.unwrap().unwrap().is_admin);

        idp.sign_out(&resolved.uid).await.unwrap();
        assert!(idp.resolve_token(&signed_in.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let db = TestDatabase::new().await.unwrap();
        let idp = LocalIdentityProvider::new(db.shared(), 60);
        idp.sign_up("bob@example.com", "oldpass").await.unwrap();

        assert!(idp.request_password_reset("ghost@example.com").await.unwrap().is_none());

        let reset = idp
            .request_password_reset("bob@example.com")
            .await
            .unwrap()
            .unwrap();

        let bad = idp
            .confirm_password_reset("bob@example.com", "000000x", "newpass")
            .await;
        assert!(matches!(bad, Err(AppError::BadRequest(_))));

        idp.confirm_password_reset("bob@example.com", &reset.code, "newpass")
            .await
            .unwrap();
        assert!(idp.sign_in("bob@example.com", "oldpass").await.is_err());
        assert!(idp.sign_in("bob@example.com", "newpass").await.is_ok());
    }
}
