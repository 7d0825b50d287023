//! Database connection management
//!
//! [`Database`] owns the single embedded-database handle for the process.
//! It is an explicitly constructed value passed to repositories, never a
//! global; tests open an isolated in-memory instance each.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use libsql::params::IntoParams;
use libsql::{Builder, Connection, Database as LibSqlDatabase, Rows};

use crate::error::{Error, Result};

use super::migrations;

/// Wrapper over the libSQL handle: lifecycle, parameterized statement
/// primitives, and transaction scoping.
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
    tx_active: AtomicBool,
}

impl Database {
    /// Open the database file at the given path, creating it if absent.
    ///
    /// Enables foreign-key enforcement (the engine defaults it off) and
    /// applies the full schema; repeated opens are no-ops schema-wise.
    /// Failure here is fatal to the application — there is no degraded mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        Self::build(&path_str).await
    }

    /// Open an in-memory database (tests and ephemeral tooling).
    pub async fn open_in_memory() -> Result<Self> {
        Self::build(":memory:").await
    }

    async fn build(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|error| Error::StorageInit(error.to_string()))?;
        let conn = db
            .connect()
            .map_err(|error| Error::StorageInit(error.to_string()))?;

        let database = Self {
            _db: db,
            conn,
            tx_active: AtomicBool::new(false),
        };
        database.configure().await?;
        migrations::run(&database.conn)
            .await
            .map_err(|error| Error::StorageInit(error.to_string()))?;
        Ok(database)
    }

    /// Configure the engine: referential integrity on, WAL for concurrency.
    async fn configure(&self) -> Result<()> {
        // WAL/synchronous are best-effort tuning; foreign keys are not.
        self.conn.execute("PRAGMA journal_mode = WAL;", ()).await.ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA foreign_keys = ON;", ())
            .await
            .map_err(|error| Error::StorageInit(error.to_string()))?;
        Ok(())
    }

    /// Run a parameterized statement, returning the affected row count.
    ///
    /// Failures carry the statement text and placeholder count, never the
    /// bound values.
    pub async fn execute(&self, sql: &str, params: impl IntoParams) -> Result<u64> {
        self.conn
            .execute(sql, params)
            .await
            .map_err(|source| query_error(sql, source))
    }

    /// Run a parameterized query, returning the row cursor.
    pub async fn query(&self, sql: &str, params: impl IntoParams) -> Result<Rows> {
        self.conn
            .query(sql, params)
            .await
            .map_err(|source| query_error(sql, source))
    }

    /// Run `work` inside a transaction: commit on `Ok`, roll back and
    /// propagate on `Err`.
    ///
    /// The engine has no nested transactions, so a second call while one is
    /// open fails with [`Error::NestedTransaction`]; compose composite
    /// atomic work into a single top-level call instead.
    pub async fn with_transaction<T, Fut>(&self, work: impl FnOnce() -> Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        if self.tx_active.swap(true, Ordering::SeqCst) {
            return Err(Error::NestedTransaction);
        }

        if let Err(error) = self.conn.execute("BEGIN IMMEDIATE", ()).await {
            self.tx_active.store(false, Ordering::SeqCst);
            return Err(error.into());
        }

        match work().await {
            Ok(value) => match self.conn.execute("COMMIT", ()).await {
                Ok(_) => {
                    self.tx_active.store(false, Ordering::SeqCst);
                    Ok(value)
                }
                Err(error) => {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    self.tx_active.store(false, Ordering::SeqCst);
                    Err(error.into())
                }
            },
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                self.tx_active.store(false, Ordering::SeqCst);
                Err(error)
            }
        }
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn query_error(sql: &str, source: libsql::Error) -> Error {
    Error::Query {
        sql: sql.to_string(),
        params: sql.matches('?').count(),
        source,
    }
}
