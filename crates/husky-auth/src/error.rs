//! Error types for authentication and session handling.

use husky_types::FieldError;

/// Errors that can occur during user and session operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A database operation failed.
    #[error("auth database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Submitted registration fields failed validation.
    #[error("invalid user fields: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// Username or email is already registered.
    #[error("conflict: {0}")]
    Conflict(FieldError),

    /// Unknown username or wrong password. The two cases are not
    /// distinguished.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// No user with the given key exists.
    #[error("user not found: {0}")]
    NotFound(String),

    /// The session lifetime pushes the expiry past the representable range.
    #[error("session lifetime out of range")]
    SessionLifetime,

    /// Hashing a password failed.
    #[error("password hashing failed: {0}")]
    Hash(String),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
