//! Test utilities for database operations.
//!
//! Tests run against an in-memory SQLite database with all migrations
//! applied, so every test gets a fresh, isolated store.

use std::sync::Arc;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::debug;

use crate::migrations::Migrator;

/// In-memory database URL.
pub const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

/// A migrated, throwaway test database.
pub struct TestDatabase {
    /// Database connection.
    pub conn: DatabaseConnection,
}

impl TestDatabase {
    /// Create a fresh in-memory database and run all migrations.
    ///
    /// The pool is limited to one connection: every connection to
    /// `sqlite::memory:` would otherwise see its own empty database.
    pub async fn new() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new(MEMORY_DATABASE_URL);
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        debug!("Created in-memory test database");

        Ok(Self { conn })
    }

    /// Get a reference to the database connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Get a shared handle for repositories.
    #[must_use]
    pub fn shared(&self) -> Arc<DatabaseConnection> {
        Arc::new(self.conn.clone())
    }
}
