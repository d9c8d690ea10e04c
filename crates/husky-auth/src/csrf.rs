//! CSRF token verification.

use thiserror::Error;

/// Reasons an unsafe request fails CSRF validation. The display strings are
/// shown to the visitor on the error page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("The CSRF token is missing.")]
    Missing,
    #[error("The CSRF token is invalid.")]
    Invalid,
    #[error("The CSRF session token is missing.")]
    NoSession,
}

/// Compares the submitted token with the one bound to the session.
pub fn verify_csrf(expected: Option<&str>, provided: Option<&str>) -> Result<(), CsrfError> {
    let expected = expected.ok_or(CsrfError::NoSession)?;
    let provided = match provided.map(str::trim) {
        Some(token) if !token.is_empty() => token,
        _ => return Err(CsrfError::Missing),
    };
    if constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        Ok(())
    } else {
        Err(CsrfError::Invalid)
    }
}

/// Byte comparison whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
