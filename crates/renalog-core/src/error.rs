//! Error types for renalog-core

use thiserror::Error;

/// Result type alias using renalog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in renalog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Opening the local database or applying the schema failed. Fatal at
    /// startup; the app cannot run without its local store.
    #[error("Storage initialization failed: {0}")]
    StorageInit(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A parameterized statement failed. Carries the statement text and its
    /// placeholder count, never the bound values (they may be sensitive).
    #[error("Query failed ({params} params): {sql}: {source}")]
    Query {
        /// Statement text
        sql: String,
        /// Number of `?` placeholders in the statement
        params: usize,
        /// Underlying driver error
        source: libsql::Error,
    },

    /// `with_transaction` was called while a transaction was already open.
    /// The engine does not support nested transactions; this is a
    /// programmer error in the calling code.
    #[error("Nested transactions are not supported")]
    NestedTransaction,

    /// Record not found where one was required to exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller-supplied data failed a business rule
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored row could not be decoded into its domain record
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// Email/password pair did not match a stored account. Deliberately does
    /// not say which half was wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Sign-up with an email that already has an account
    #[error("An account with this email already exists")]
    EmailTaken,

    /// Local and remote both mutated the same record since the last sync
    #[error("Sync conflict on {table}/{record_id}")]
    SyncConflict {
        /// Table of the conflicting record
        table: String,
        /// Id of the conflicting record
        record_id: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
