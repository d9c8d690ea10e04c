//! Application error type and the HTML error pages it renders.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use husky_auth::{AuthError, CsrfError};
use husky_blog::BlogError;
use thiserror::Error;

use crate::templates;

/// Errors surfaced by request handlers and middleware.
///
/// Each variant maps to a rendered error page; internal details are logged
/// and never shown to the visitor.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("csrf check failed: {0}")]
    Csrf(#[from] CsrfError),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Csrf(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let description = match &self {
            Self::BadRequest(_) => {
                "The browser (or proxy) sent a request that this server could not understand."
                    .to_string()
            }
            Self::Csrf(e) => e.to_string(),
            Self::Forbidden => "You don't have the permission to access this resource.".to_string(),
            Self::NotFound => "The requested URL was not found on the server.".to_string(),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                "The server encountered an internal error and was unable to complete your request."
                    .to_string()
            }
        };

        if matches!(self, Self::BadRequest(_) | Self::Csrf(_)) {
            tracing::debug!(reason = %self, "rejecting request");
        }

        let heading = status.canonical_reason().unwrap_or("Error");
        (
            status,
            Html(templates::error_page(status.as_u16(), heading, &description)),
        )
            .into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotFound(_) => Self::NotFound,
            AuthError::Validation(_) | AuthError::Conflict(_) | AuthError::InvalidCredentials => {
                Self::BadRequest(e.to_string())
            }
            AuthError::Database(_) | AuthError::Hash(_) | AuthError::SessionLifetime => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<BlogError> for AppError {
    fn from(e: BlogError) -> Self {
        match e {
            BlogError::NotFound(_) => Self::NotFound,
            BlogError::Forbidden(_) => Self::Forbidden,
            BlogError::Validation(_) => Self::BadRequest(e.to_string()),
            BlogError::Database(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        Self::Internal(format!("db connection failed: {e}"))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {e}"))
    }
}

/// Router fallback: unknown paths render the 404 page.
pub async fn not_found() -> AppError {
    AppError::NotFound
}
