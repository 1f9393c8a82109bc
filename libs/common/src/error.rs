//! Error types shared by the services that talk to PostgreSQL

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Failure raised while configuring, connecting to or querying the database
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The pool could not be established
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// A statement failed to execute or a row failed to decode
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Applying the bundled migrations failed
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
