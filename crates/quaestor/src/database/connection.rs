/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Database connection management for the SQLite backend.
//!
//! Provides an async connection pool built on `deadpool-diesel`. Quaestor
//! needs a single durable relational store with atomic multi-row
//! transactions; SQLite satisfies that with a pool of size one, which also
//! sidesteps "database is locked" errors under concurrent writers.
//!
//! # Example
//!
//! ```rust,ignore
//! use quaestor::database::Database;
//!
//! let db = Database::new("path/to/quaestor.db");
//! db.run_migrations().await?;
//! ```

use deadpool_diesel::sqlite::{Manager as SqliteManager, Pool as SqlitePool, Runtime};
use tracing::info;

/// A pooled SQLite database handle.
///
/// `Database` is `Clone`; each clone references the same underlying pool and
/// may be shared freely across tasks.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Database(sqlite)")
    }
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// Accepts a file path, `:memory:`, or a `sqlite://`-prefixed URL.
    ///
    /// # Panics
    ///
    /// Panics if the connection pool cannot be created. Pool construction
    /// failure is an initialization-time fatal: there is nothing the engine
    /// can do without storage.
    pub fn new(connection_string: &str) -> Self {
        let connection_url = Self::build_sqlite_url(connection_string);
        let manager = SqliteManager::new(connection_url, Runtime::Tokio1);
        // SQLite has limited concurrent write support even with WAL mode.
        // A single connection avoids lock contention between the poll loops.
        let pool = SqlitePool::builder(manager)
            .max_size(1)
            .build()
            .expect("Failed to create SQLite connection pool");

        info!("SQLite connection pool initialized (size: 1)");

        Self { pool }
    }

    /// Returns a clone of the connection pool.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Gets a pooled connection.
    pub async fn get_connection(
        &self,
    ) -> Result<
        deadpool::managed::Object<SqliteManager>,
        deadpool::managed::PoolError<deadpool_diesel::Error>,
    > {
        self.pool.get().await
    }

    /// Builds a SQLite connection URL.
    fn build_sqlite_url(connection_string: &str) -> String {
        // Strip sqlite:// prefix if present
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    /// Runs pending database migrations.
    ///
    /// Applies WAL and busy_timeout pragmas before migrating. A failure here
    /// is fatal to engine startup and is surfaced to the caller.
    pub async fn run_migrations(&self) -> Result<(), String> {
        let conn = self.pool.get().await.map_err(|e| e.to_string())?;
        conn.interact(|conn| {
            use diesel::prelude::*;
            use diesel_migrations::MigrationHarness;

            // WAL mode allows concurrent reads during writes.
            diesel::sql_query("PRAGMA journal_mode=WAL;")
                .execute(conn)
                .map_err(|e| format!("Failed to set WAL mode: {}", e))?;
            // busy_timeout makes SQLite wait instead of failing on locks.
            diesel::sql_query("PRAGMA busy_timeout=30000;")
                .execute(conn)
                .map_err(|e| format!("Failed to set busy_timeout: {}", e))?;

            conn.run_pending_migrations(crate::database::SQLITE_MIGRATIONS)
                .map_err(|e| format!("Failed to run migrations: {}", e))?;
            Ok::<_, String>(())
        })
        .await
        .map_err(|e| format!("Failed to run migrations: {}", e))??;

        Ok(())
    }
}
