//! Optimistic read-modify-write transactions.
//!
//! Every counter and membership update runs inside [`run_transaction`]. Writes
//! inside the closure are guarded by a `version` column (or a primary key for
//! inserts); a stale snapshot surfaces as [`AppError::WriteConflict`] and the
//! whole closure is re-executed against fresh reads. Nothing is visible to
//! other readers until the attempt commits.

use std::future::Future;
use std::pin::Pin;

use companion_common::{AppError, AppResult};
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, SqlErr, TransactionTrait};
use tracing::{debug, warn};

/// Future returned by a transaction body.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'c>>;

/// Run `op` in a transaction, retrying on write conflicts.
///
/// The closure may run several times and must not have side effects outside
/// the transaction. After `max_attempts` conflicting attempts the call fails
/// with [`AppError::RetriesExhausted`].
pub async fn run_transaction<T, F>(
    db: &DatabaseConnection,
    max_attempts: u32,
    op: F,
) -> AppResult<T>
where
    T: Send,
    F: for<'c> Fn(&'c DatabaseTransaction) -> TxFuture<'c, T>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let txn = db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match op(&txn).await {
            Ok(value) => match txn.commit().await {
                Ok(()) => return Ok(value),
                Err(e) if is_conflict(&e) => {
                    debug!(attempt, error = %e, "Commit conflicted, retrying transaction");
                }
                Err(e) => return Err(AppError::Database(e.to_string())),
            },
            Err(AppError::WriteConflict(what)) => {
                debug!(attempt, conflict = %what, "Write conflict, retrying transaction");
                rollback(txn).await;
            }
            Err(e) => {
                rollback(txn).await;
                return Err(e);
            }
        }
    }

    warn!(max_attempts, "Transaction retries exhausted");
    Err(AppError::RetriesExhausted(max_attempts))
}

async fn rollback(txn: DatabaseTransaction) {
    if let Err(e) = txn.rollback().await {
        warn!(error = %e, "Failed to roll back transaction");
    }
}

/// Map a database error from a guarded write, turning contention into a retryable conflict.
pub fn map_write_err(what: &str, err: DbErr) -> AppError {
    if is_conflict(&err) {
        AppError::WriteConflict(what.to_string())
    } else {
        AppError::Database(err.to_string())
    }
}

/// Whether the error means another writer got there first.
fn is_conflict(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let message = err.to_string();
    // Postgres serialization failure (40001) and deadlock (40P01)
    message.contains("could not serialize access") || message.contains("deadlock detected")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let db = TestDatabase::new().await.unwrap();
        let attempts = Arc::new(AtomicU32::new(0));

        let result = run_transaction(&db.conn, 5, |_txn| {
            let attempts = attempts.clone();
            Box::pin(async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(AppError::WriteConflict("post".to_string()))
                } else {
                    Ok(n)
                }
            })
        })
        .await
        .unwrap();

        assert_eq!(result, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_as_transient_error() {
        let db = TestDatabase::new().await.unwrap();
        let attempts = Arc::new(AtomicU32::new(0));

        let result: AppResult<()> = run_transaction(&db.conn, 4, |_txn| {
            let attempts = attempts.clone();
            Box::pin(async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AppError::WriteConflict("likes".to_string()))
            })
        })
        .await;

        assert!(matches!(result, Err(AppError::RetriesExhausted(4))));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let db = TestDatabase::new().await.unwrap();
        let attempts = Arc::new(AtomicU32::new(0));

        let result: AppResult<()> = run_transaction(&db.conn, 5, |_txn| {
            let attempts = attempts.clone();
            Box::pin(async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Locked("post".to_string()))
            })
        })
        .await;

        assert!(matches!(result, Err(AppError::Locked(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
