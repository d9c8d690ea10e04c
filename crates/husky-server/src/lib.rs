//! Husky blog server library logic.
//!
//! [`app`] assembles the router: auth routes under `/auth`, blog routes
//! under `/blog`, HTML error pages, and the session and CSRF layers around
//! the pages that need them.

pub mod api_auth;
pub mod api_blog;
pub mod commands;
pub mod config;
pub mod error;
pub mod middleware;
pub mod templates;

use axum::{extract::DefaultBodyLimit, routing::get, Extension, Json, Router};
use chrono::Duration;
use husky_db::DbPool;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{Config, ConfigError};
use crate::error::AppError;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Site title shown in the header.
    pub site_title: String,
    /// Posts per index page.
    pub posts_per_page: u32,
    /// Lifetime of an ordinary session.
    pub session_ttl: Duration,
    /// Lifetime of a "remember me" session.
    pub remember_ttl: Duration,
    /// Enforce CSRF tokens on unsafe requests.
    pub csrf_enabled: bool,
    /// Mark session cookies `Secure`.
    pub secure_cookie: bool,
    /// Directory served under `/static`.
    pub static_dir: String,
}

impl AppState {
    /// Builds the state from a pool and the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a session lifetime is out of
    /// range.
    pub fn new(pool: DbPool, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            pool,
            site_title: config.blog.title.clone(),
            posts_per_page: config.blog.posts_per_page.max(1),
            session_ttl: config.session_ttl()?,
            remember_ttl: config.remember_ttl()?,
            csrf_enabled: config.csrf_enabled(),
            secure_cookie: config.secure_cookie(),
            static_dir: config.server.static_dir.clone(),
        })
    }

    /// Runs blocking database work on the blocking thread pool.
    ///
    /// The connection is returned to the pool when `f` finishes, so callers
    /// never hold more than one at a time.
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await?
    }
}

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Smoke-test route at the site root.
async fn base_test() -> &'static str {
    "base test"
}

/// Builds the application router with all routes.
///
/// Only the auth and blog pages run behind the session and CSRF layers.
/// `/`, `/health`, `/static` and the 404 fallback never touch the
/// `sessions` table.
pub fn app(state: AppState) -> Router {
    let pages = Router::new()
        .merge(api_auth::routes())
        .merge(api_blog::routes())
        .layer(axum::middleware::from_fn(middleware::csrf_middleware))
        .layer(axum::middleware::from_fn(middleware::session_middleware));

    let router = pages
        .route("/", get(base_test))
        .route("/health", get(health))
        .fallback(error::not_found);

    let static_dir = state.static_dir.clone();
    let router = if std::path::Path::new(&static_dir).is_dir() {
        tracing::info!(path = %static_dir, "serving static files at /static");
        router.nest_service("/static", ServeDir::new(&static_dir))
    } else {
        tracing::info!(path = %static_dir, "static directory not found, skipping static file serving");
        router
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
