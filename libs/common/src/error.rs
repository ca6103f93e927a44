//! Custom error types for the common library
//!
//! This module defines the storage-level error types shared by the
//! authentication and API services.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors returned by the credential store and usage ledger
#[derive(Error, Debug)]
pub enum StoreError {
    /// A user with this email already exists
    #[error("User already exists")]
    DuplicateUser,

    /// No user with this identifier
    #[error("User not found")]
    UserNotFound,

    /// The account exists but has been deactivated
    #[error("Account is disabled")]
    AccountDisabled,

    /// The balance does not cover the requested amount; nothing was changed
    #[error("Insufficient credits")]
    InsufficientCredits,

    /// Metered amounts must be strictly positive
    #[error("Invalid credit amount: {0}")]
    InvalidAmount(i64),

    /// Stored plan value could not be decoded
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    /// Password hashing or hash parsing failed
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<SqlxError> for StoreError {
    fn from(err: SqlxError) -> Self {
        StoreError::Database(DatabaseError::Query(err))
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
