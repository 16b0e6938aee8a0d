//! Repositories over the document store.
//!
//! Methods suffixed `_tx` run inside a caller-supplied transaction and
//! guard their writes with the row version read in the same transaction.

mod article;
mod comment;
mod credential;
mod mail;
mod notification;
mod post;
mod survey;
mod user;
mod user_likes;

pub use article::ArticleRepository;
pub use comment::CommentRepository;
pub use credential::CredentialRepository;
pub use mail::MailRepository;
pub use notification::NotificationRepository;
pub use post::{PostFilter, PostOrder, PostRepository};
pub use survey::SurveyRepository;
pub use user::UserRepository;
pub use user_likes::{LikeIndex, UserLikesRepository};

use companion_common::{AppError, AppResult};
use sea_orm::{DbErr, UpdateResult, prelude::Json};
use serde::{Serialize, de::DeserializeOwned};

/// Page size used when scanning whole collections.
pub const SCAN_PAGE_SIZE: u64 = 500;

/// Decode a JSON column into its typed form.
pub fn decode_json<T: DeserializeOwned>(value: &Json, what: &str) -> AppResult<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::Internal(format!("Malformed {what}: {e}")))
}

/// Encode a typed value for a JSON column.
pub fn encode_json<T: Serialize>(value: &T, what: &str) -> AppResult<Json> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(format!("Encoding {what}: {e}")))
}

/// Fail with a write conflict when a version-guarded update matched nothing.
fn expect_one(result: Result<UpdateResult, DbErr>, what: &str) -> AppResult<()> {
    let result = result.map_err(|e| crate::map_write_err(what, e))?;
    if result.rows_affected == 0 {
        return Err(AppError::WriteConflict(what.to_string()));
    }
    Ok(())
}

fn db_err(e: DbErr) -> AppError {
    AppError::Database(e.to_string())
}
