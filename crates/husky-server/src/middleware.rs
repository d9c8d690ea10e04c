//! Session loading, CSRF enforcement, and the login-required extractor.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Duration, Utc};
use husky_auth::{create_session, get_user, load_session, set_flash, take_flash, verify_csrf};
use husky_types::{Flash, FlashKind, User};
use std::sync::Arc;

use crate::{error::AppError, templates::PageContext, AppState};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "husky_session";

/// Header checked for the CSRF token before the form body.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Form field carrying the CSRF token.
pub const CSRF_FIELD: &str = "csrf_token";

/// Upper bound on a buffered form body during CSRF checks.
const MAX_FORM_BYTES: usize = 256 * 1024;

/// The visitor's session as seen by handlers.
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// Primary key of the session row.
    pub token_hash: String,
    pub csrf_token: String,
    /// Logged-in user, if any.
    pub user: Option<User>,
    /// Flash message popped for this page view (GET requests only).
    pub flash: Option<Flash>,
}

impl SessionContext {
    /// Template context for rendering a page for this visitor.
    pub fn page<'a>(&'a self, state: &'a AppState) -> PageContext<'a> {
        PageContext {
            site_title: &state.site_title,
            user: self.user.as_ref(),
            csrf_token: &self.csrf_token,
            flash: self.flash.as_ref(),
        }
    }
}

/// Reads one cookie from the request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Builds the `Set-Cookie` value for a session token.
pub fn session_cookie(
    token: &str,
    max_age: Duration,
    secure: bool,
) -> Result<HeaderValue, AppError> {
    let value = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        max_age.num_seconds().max(0),
        if secure { "; Secure" } else { "" }
    );
    HeaderValue::from_str(&value)
        .map_err(|e| AppError::Internal(format!("invalid session cookie: {e}")))
}

fn response_sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{SESSION_COOKIE}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Loads (or starts) the visitor's session and stores a [`SessionContext`]
/// in the request extensions.
///
/// A new anonymous session is issued when the cookie is absent, unknown, or
/// expired. Its cookie is attached to the response unless the handler
/// already set one (login and logout do).
pub async fn session_middleware(mut req: Request<Body>, next: Next) -> Response {
    let state = match req.extensions().get::<Arc<AppState>>() {
        Some(state) => state.clone(),
        None => return AppError::Internal("application state missing".to_string()).into_response(),
    };

    let token = cookie_value(req.headers(), SESSION_COOKIE);
    let pop_flash = req.method() == Method::GET;
    let ttl = state.session_ttl;

    let loaded = state
        .with_conn(move |conn| {
            let now = Utc::now();
            if let Some(token) = token {
                if let Some(session) = load_session(conn, &token, now)? {
                    let user = match session.user_id {
                        Some(id) => Some(get_user(conn, id)?),
                        None => None,
                    };
                    let flash = if pop_flash {
                        take_flash(conn, &session.token_hash)?
                    } else {
                        None
                    };
                    let ctx = SessionContext {
                        token_hash: session.token_hash,
                        csrf_token: session.csrf_token,
                        user,
                        flash,
                    };
                    return Ok((ctx, None));
                }
            }

            let issued = create_session(conn, None, ttl)?;
            let ctx = SessionContext {
                token_hash: issued.session.token_hash,
                csrf_token: issued.session.csrf_token,
                user: None,
                flash: None,
            };
            Ok((ctx, Some(issued.token)))
        })
        .await;

    let (ctx, new_token) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => return e.into_response(),
    };

    req.extensions_mut().insert(ctx);
    let mut response = next.run(req).await;

    if let Some(token) = new_token {
        if !response_sets_session_cookie(&response) {
            match session_cookie(&token, ttl, state.secure_cookie) {
                Ok(cookie) => {
                    response.headers_mut().append(header::SET_COOKIE, cookie);
                }
                Err(e) => return e.into_response(),
            }
        }
    }

    response
}

fn is_unsafe(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Rejects unsafe requests whose CSRF token does not match the session's.
///
/// The token is taken from the `X-CSRF-Token` header, or else from the
/// `csrf_token` field of a urlencoded form body. The body is buffered and
/// handed on unchanged. Must run inside [`session_middleware`].
pub async fn csrf_middleware(req: Request<Body>, next: Next) -> Response {
    if !is_unsafe(req.method()) {
        return next.run(req).await;
    }

    let enabled = req
        .extensions()
        .get::<Arc<AppState>>()
        .map(|state| state.csrf_enabled)
        .unwrap_or(true);
    if !enabled {
        return next.run(req).await;
    }

    let expected = req
        .extensions()
        .get::<SessionContext>()
        .map(|ctx| ctx.csrf_token.clone());

    let header_token = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (req, provided) = match header_token {
        Some(token) => (req, Some(token)),
        None if is_form(req.headers()) => {
            let (parts, body) = req.into_parts();
            let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
                Ok(bytes) => bytes,
                Err(e) => return AppError::BadRequest(format!("unreadable form body: {e}")).into_response(),
            };
            let token = url::form_urlencoded::parse(&bytes)
                .find(|(key, _)| key == CSRF_FIELD)
                .map(|(_, value)| value.into_owned());
            (Request::from_parts(parts, Body::from(bytes)), token)
        }
        None => (req, None),
    };

    if let Err(e) = verify_csrf(expected.as_deref(), provided.as_deref()) {
        tracing::warn!(
            method = %req.method(),
            path = req.uri().path(),
            reason = %e,
            "csrf validation failed"
        );
        return AppError::Csrf(e).into_response();
    }

    next.run(req).await
}

/// Extractor for routes that require a logged-in user.
///
/// Anonymous visitors are redirected to `/auth/login?next=<path>` with a
/// flash asking them to log in.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or_else(|| {
                AppError::Internal("session context missing".to_string()).into_response()
            })?;

        if let Some(user) = ctx.user {
            return Ok(CurrentUser(user));
        }

        if let Some(state) = parts.extensions.get::<Arc<AppState>>().cloned() {
            let token_hash = ctx.token_hash.clone();
            let flashed = state
                .with_conn(move |conn| {
                    set_flash(
                        conn,
                        &token_hash,
                        &Flash::new(FlashKind::Warning, "Please log in to access this page."),
                    )?;
                    Ok(())
                })
                .await;
            if let Err(e) = flashed {
                return Err(e.into_response());
            }
        }

        let next = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Err(Redirect::to(&login_url(next)).into_response())
    }
}

/// `/auth/login?next=<encoded path>`.
pub fn login_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/auth/login?next={encoded}")
}

/// Accepts only same-site relative paths as a post-login redirect target.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; husky_session=abc"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));
        assert_eq!(cookie_value(&headers, SESSION_COOKIE).as_deref(), Some("abc"));
        assert_eq!(cookie_value(&headers, "b").as_deref(), Some("2"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("tok", Duration::hours(1), false).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "husky_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"
        );
        let secure = session_cookie("tok", Duration::seconds(-5), true).unwrap();
        assert!(secure.to_str().unwrap().ends_with("Max-Age=0; Secure"));
    }

    #[test]
    fn next_must_be_local() {
        assert_eq!(safe_next(Some("/blog/post/new")), Some("/blog/post/new"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn login_url_encodes_next() {
        assert_eq!(
            login_url("/blog/?page=2"),
            "/auth/login?next=%2Fblog%2F%3Fpage%3D2"
        );
    }

    #[test]
    fn unsafe_methods() {
        assert!(is_unsafe(&Method::POST));
        assert!(is_unsafe(&Method::DELETE));
        assert!(!is_unsafe(&Method::GET));
        assert!(!is_unsafe(&Method::HEAD));
    }
}
