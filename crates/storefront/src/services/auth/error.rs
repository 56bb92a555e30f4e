//! Errors from registration, login and password changes.

use thiserror::Error;

use crate::db::RepositoryError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] wellspring_core::EmailError),

    /// Wrong password, or no account with that email. Callers cannot tell
    /// which.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The session points at an account that no longer exists.
    #[error("account not found")]
    AccountNotFound,

    #[error("an account with this email already exists")]
    EmailTaken,

    /// Names the password rule that failed.
    #[error("{0}")]
    WeakPassword(String),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("password hashing failed")]
    PasswordHash,
}
