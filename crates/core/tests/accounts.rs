//! Account and admin tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use companion_common::{AppError, BlobStore, IdGenerator, LocalBlobStore};
use companion_core::{
    AdminService, AuthService, BroadcastMailInput, IdentityProvider, IdentityProviderService,
    LocalIdentityProvider, MailService, RegisterInput, Session, admin_guard, auth_guard,
};
use companion_db::{
    repositories::{MailRepository, UserRepository},
    test_utils::TestDatabase,
};

struct Accounts {
    _db: TestDatabase,
    auth: AuthService,
    admin: AdminService,
    identity: IdentityProviderService,
    mail_repo: MailRepository,
}

async fn accounts() -> Accounts {
    let db = TestDatabase::new().await.unwrap();
    let shared = db.shared();
    let identity: IdentityProviderService = Arc::new(LocalIdentityProvider::new(shared.clone(), 60));
    let mail_repo = MailRepository::new(shared.clone());
    let mail = MailService::new(mail_repo.clone(), "http://localhost:3000".to_string());
    let blob_dir = std::env::temp_dir().join(format!(
        "companion-accounts-{}",
        IdGenerator::new().generate_blob_name()
    ));
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        blob_dir,
        "http://localhost/files".to_string(),
    ));

    Accounts {
        auth: AuthService::new(
            shared.clone(),
            identity.clone(),
            mail.clone(),
            blobs,
            "/files/shared/profile_default.png".to_string(),
        ),
        admin: AdminService::new(UserRepository::new(shared), identity.clone(), mail),
        identity,
        mail_repo,
        _db: db,
    }
}

fn registration(email: &str, username: &str) -> RegisterInput {
    RegisterInput {
        email: email.to_string(),
        password: "hunter22".to_string(),
        username: username.to_string(),
    }
}

#[tokio::test]
async fn test_register_login_logout() {
    let accounts = accounts().await;
    let registered = accounts
        .auth
        .register(registration("alice@example.com", "alice"))
        .await
        .unwrap();
    assert_eq!(registered.user.photo_url, "/files/shared/profile_default.png");
    assert!(!registered.user.disabled);

    let err = accounts
        .auth
        .register(registration("alice@example.com", "alice2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = accounts
        .auth
        .login("alice@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    let session = Session::new();
    let mut changes = session.subscribe();
    accounts
        .auth
        .login_session(&session, "alice@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert!(session.current().is_none());
    assert!(!changes.has_changed().unwrap());

    let logged_in = accounts
        .auth
        .login_session(&session, "alice@example.com", "hunter22")
        .await
        .unwrap();
    assert!(changes.has_changed().unwrap());
    assert!(auth_guard(session.current().as_ref()).is_allowed());
    assert!(!admin_guard(session.current().as_ref()).is_allowed());

    let resolved = accounts.auth.authenticate(&logged_in.token).await.unwrap();
    assert_eq!(resolved.map(|i| i.uid), Some(logged_in.user.id.clone()));

    accounts.auth.logout_session(&session).await.unwrap();
    assert!(!auth_guard(session.current().as_ref()).is_allowed());
    assert!(accounts.auth.authenticate(&logged_in.token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_disabled_account_is_signed_out() {
    let accounts = accounts().await;
    let admin = accounts
        .auth
        .register(registration("root@example.com", "root"))
        .await
        .unwrap();
    accounts
        .identity
        .set_admin_claim(&admin.identity.uid, true)
        .await
        .unwrap();
    let admin = accounts.auth.login("root@example.com", "hunter22").await.unwrap();
    assert!(admin.identity.is_admin);

    let bob = accounts
        .auth
        .register(registration("bob@example.com", "bob"))
        .await
        .unwrap();

    accounts
        .admin
        .set_user_disabled(&admin.identity, &bob.user.id, true)
        .await
        .unwrap();

    let err = accounts
        .auth
        .login("bob@example.com", "hunter22")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountDisabled));
    assert!(accounts.auth.authenticate(&bob.token).await.unwrap().is_none());

    let err = accounts
        .admin
        .set_user_disabled(&bob.identity, &admin.user.id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_password_reset_via_mailed_code() {
    let accounts = accounts().await;
    accounts
        .auth
        .register(registration("carol@example.com", "carol"))
        .await
        .unwrap();

    accounts
        .auth
        .request_password_reset("nobody@example.com")
        .await
        .unwrap();
    assert!(accounts.mail_repo.find_all().await.unwrap().is_empty());

    accounts
        .auth
        .request_password_reset("carol@example.com")
        .await
        .unwrap();
    let mails = accounts.mail_repo.find_all().await.unwrap();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "carol@example.com");

    let start = mails[0].html.find("<strong>").unwrap() + "<strong>".len();
    let end = mails[0].html.find("</strong>").unwrap();
    let code = &mails[0].html[start..end];

    let err = accounts
        .auth
        .confirm_password_reset("carol@example.com", "000000x", "new-secret")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    accounts
        .auth
        .confirm_password_reset("carol@example.com", code, "new-secret")
        .await
        .unwrap();
    assert!(
        accounts
            .auth
            .login("carol@example.com", "new-secret")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_admin_search_and_broadcast() {
    let accounts = accounts().await;
    let root = accounts
        .auth
        .register(registration("root@example.com", "root"))
        .await
        .unwrap();
    let err = accounts
        .admin
        .grant_admin(&root.identity, &root.identity.uid)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    accounts
        .identity
        .set_admin_claim(&root.identity.uid, true)
        .await
        .unwrap();
    let root = accounts.auth.login("root@example.com", "hunter22").await.unwrap();

    for name in ["anna", "andy", "bert"] {
        accounts
            .auth
            .register(registration(&format!("{name}@example.com"), name))
            .await
            .unwrap();
    }

    let found = accounts.admin.search_users(&root.identity, "an").await.unwrap();
    let names: Vec<&str> = found.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["andy", "anna"]);

    let queued = accounts
        .admin
        .send_email_to_all(
            &root.identity,
            BroadcastMailInput {
                subject: "Maintenance".to_string(),
                html: "<p>Down tonight</p>".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(queued, 4);
    assert_eq!(accounts.mail_repo.find_all().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_profile_picture_path() {
    let accounts = accounts().await;
    let user = accounts
        .auth
        .register(registration("pic@example.com", "pic"))
        .await
        .unwrap();

    let url = accounts
        .auth
        .update_profile_picture(&user.user.id, b"jpeg", "image/jpeg")
        .await
        .unwrap();
    assert_eq!(
        url,
        format!("http://localhost/files/profiles/{}/profilePic.jpg", user.user.id)
    );
    assert_eq!(accounts.auth.get_user(&user.user.id).await.unwrap().photo_url, url);
}
