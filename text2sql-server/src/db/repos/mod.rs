//! Repository implementations for the metadata store
//!
//! Each repository borrows the pool and relies on table constraints for
//! uniqueness: conflicts are detected from the database error, never by
//! check-then-insert.

pub mod databases;
pub mod users;

pub use databases::{DatabaseRepo, UserDatabase};
pub use users::{User, UserRepo};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("{resource} '{value}' already exists")]
    Conflict { resource: &'static str, value: String },
}

/// True when `err` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
