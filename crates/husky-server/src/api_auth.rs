//! Registration, login, and logout pages, mounted under `/auth`.

use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Extension, Form, Query,
    },
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use husky_auth::{
    authenticate, create_session, create_user, delete_session, login_session, set_flash,
    AuthError, NewUser,
};
use husky_types::{Flash, FlashKind};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::{safe_next, session_cookie, CurrentUser, SessionContext},
    templates::{self, RegisterFormValues},
    AppState,
};

/// Where visitors land after logging in, registering, or logging out.
const HOME: &str = "/blog/";

/// Routes for the auth section.
pub fn routes() -> Router {
    Router::new()
        .route("/auth/register", get(register_form).post(register))
        .route("/auth/login", get(login_form).post(login))
        .route("/auth/logout", post(logout))
}

/// Form body for `POST /auth/register`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub password2: String,
}

/// Form body for `POST /auth/login`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    /// Present (any value) when the "remember me" box is ticked.
    pub remember: Option<String>,
    pub next: Option<String>,
}

/// Query string for `GET /auth/login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Redirect that also installs a new session cookie.
fn redirect_with_session(
    state: &AppState,
    target: &str,
    token: &str,
    ttl: chrono::Duration,
) -> Result<Response, AppError> {
    let cookie = session_cookie(token, ttl, state.secure_cookie)?;
    let mut response = Redirect::to(target).into_response();
    response.headers_mut().append(header::SET_COOKIE, cookie);
    Ok(response)
}

/// Handler for `GET /auth/register`.
pub async fn register_form(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Response {
    if ctx.user.is_some() {
        return Redirect::to(HOME).into_response();
    }
    Html(templates::register_page(
        &ctx.page(&state),
        &RegisterFormValues::default(),
        &[],
    ))
    .into_response()
}

/// Handler for `POST /auth/register`.
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    form: Result<Form<RegisterForm>, FormRejection>,
) -> Result<Response, AppError> {
    if ctx.user.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }
    let Form(form) = form.map_err(|e| AppError::BadRequest(e.to_string()))?;

    let new = NewUser {
        username: form.username.clone(),
        email: form.email.clone(),
        name: form.name.clone(),
        password: form.password,
        password2: form.password2,
    };
    let old_hash = ctx.token_hash.clone();
    let ttl = state.session_ttl;

    let outcome = state
        .with_conn(move |conn| match create_user(conn, &new) {
            Ok(user) => {
                let issued = login_session(conn, Some(&old_hash), user.id, ttl)?;
                set_flash(
                    conn,
                    &issued.session.token_hash,
                    &Flash::new(FlashKind::Success, format!("Welcome, {}!", user.name)),
                )?;
                Ok(Ok(issued.token))
            }
            Err(AuthError::Validation(errors)) => Ok(Err(errors)),
            Err(AuthError::Conflict(error)) => Ok(Err(vec![error])),
            Err(e) => Err(AppError::from(e)),
        })
        .await?;

    match outcome {
        Ok(token) => redirect_with_session(&state, HOME, &token, ttl),
        Err(errors) => {
            let values = RegisterFormValues {
                username: &form.username,
                email: &form.email,
                name: &form.name,
            };
            Ok(Html(templates::register_page(&ctx.page(&state), &values, &errors)).into_response())
        }
    }
}

/// Handler for `GET /auth/login`.
pub async fn login_form(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    query: Result<Query<LoginQuery>, QueryRejection>,
) -> Response {
    if ctx.user.is_some() {
        return Redirect::to(HOME).into_response();
    }
    let next = query.ok().and_then(|Query(q)| q.next);
    Html(templates::login_page(
        &ctx.page(&state),
        "",
        false,
        safe_next(next.as_deref()),
        None,
    ))
    .into_response()
}

/// Handler for `POST /auth/login`.
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Response, AppError> {
    let Form(form) = form.map_err(|e| AppError::BadRequest(e.to_string()))?;

    let remember = form.remember.is_some();
    let ttl = if remember {
        state.remember_ttl
    } else {
        state.session_ttl
    };
    let username = form.username.clone();
    let password = form.password;
    let old_hash = ctx.token_hash.clone();

    let outcome = state
        .with_conn(move |conn| match authenticate(conn, &username, &password) {
            Ok(user) => {
                let issued = login_session(conn, Some(&old_hash), user.id, ttl)?;
                set_flash(
                    conn,
                    &issued.session.token_hash,
                    &Flash::new(FlashKind::Info, "Login success."),
                )?;
                Ok(Some(issued.token))
            }
            Err(AuthError::InvalidCredentials) => Ok(None),
            Err(e) => Err(AppError::from(e)),
        })
        .await?;

    let next = safe_next(form.next.as_deref());
    match outcome {
        Some(token) => redirect_with_session(&state, next.unwrap_or(HOME), &token, ttl),
        None => Ok(Html(templates::login_page(
            &ctx.page(&state),
            &form.username,
            remember,
            next,
            Some("Invalid username or password."),
        ))
        .into_response()),
    }
}

/// Handler for `POST /auth/logout`.
///
/// Ends the session and starts a fresh anonymous one that carries the
/// "Logout success." flash.
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    let old_hash = ctx.token_hash.clone();
    let ttl = state.session_ttl;

    let token = state
        .with_conn(move |conn| {
            delete_session(conn, &old_hash)?;
            let issued = create_session(conn, None, ttl)?;
            set_flash(
                conn,
                &issued.session.token_hash,
                &Flash::new(FlashKind::Info, "Logout success."),
            )?;
            Ok(issued.token)
        })
        .await?;

    tracing::info!(user_id = user.id, "user logged out");
    redirect_with_session(&state, HOME, &token, ttl)
}
