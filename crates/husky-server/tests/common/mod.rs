//! Shared harness for driving the router like a browser: one cookie jar
//! slot for the session cookie, form posts, and body helpers.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use husky_db::{create_pool, DbPool, DbRuntimeSettings};
use husky_server::{
    app,
    config::{Config, Profile},
    AppState,
};
use tower::ServiceExt;

pub struct TestClient {
    pub router: Router,
    pub pool: DbPool,
    cookie: Option<String>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    /// Full `Set-Cookie` value for the session cookie, if one was issued.
    pub session_cookie: Option<String>,
    pub body: String,
}

/// Testing-profile configuration: in-memory database, CSRF off.
pub fn testing_config() -> Config {
    Config::for_profile(Profile::Testing)
}

/// Creates the schema in a fresh in-memory pool, then lets `seed` insert
/// rows before the app takes over the single connection.
pub fn client_with(config: Config, seed: impl FnOnce(&rusqlite::Connection)) -> TestClient {
    let pool = create_pool(":memory:", DbRuntimeSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        husky_db::run_migrations(&conn).unwrap();
        seed(&conn);
    }
    let router = app(AppState::new(pool.clone(), &config).unwrap());
    TestClient {
        router,
        pool,
        cookie: None,
    }
}

pub fn client() -> TestClient {
    client_with(testing_config(), |_| {})
}

impl TestClient {
    pub async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        self.absorb(response).await
    }

    async fn absorb(&mut self, response: Response<Body>) -> TestResponse {
        let mut session_cookie = None;
        for value in response.headers().get_all(header::SET_COOKIE) {
            let value = value.to_str().unwrap();
            if let Some(pair) = value.split(';').next() {
                if pair.starts_with("husky_session=") {
                    self.cookie = Some(pair.to_string());
                    session_cookie = Some(value.to_string());
                }
            }
        }
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            location,
            session_cookie,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = self.request("GET", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_form(&mut self, uri: &str, form: &[(&str, &str)]) -> TestResponse {
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let request = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub fn has_session_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    /// Drops the session cookie, as a fresh browser would.
    pub fn forget_session(&mut self) {
        self.cookie = None;
    }

    /// Rows currently in the `sessions` table.
    pub fn session_rows(&self) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap()
    }

    /// The `husky_session=<token>` pair the client currently sends.
    pub fn session_cookie(&self) -> Option<String> {
        self.cookie.clone()
    }

    pub async fn register(&mut self, username: &str, password: &str) -> TestResponse {
        let email = format!("{username}@example.com");
        self.post_form(
            "/auth/register",
            &[
                ("username", username),
                ("email", &email),
                ("name", username),
                ("password", password),
                ("password2", password),
            ],
        )
        .await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> TestResponse {
        self.post_form(
            "/auth/login",
            &[("username", username), ("password", password)],
        )
        .await
    }

    pub async fn logout(&mut self) -> TestResponse {
        self.post_form("/auth/logout", &[]).await
    }

    pub async fn new_post(&mut self, title: &str, body: &str) -> TestResponse {
        self.post_form("/blog/post/new", &[("title", title), ("body", body)])
            .await
    }
}

/// Extracts the CSRF token from the page's `<meta name="csrf-token">`.
pub fn csrf_token(html: &str) -> String {
    let marker = r#"<meta name="csrf-token" content=""#;
    let start = html.find(marker).unwrap() + marker.len();
    let end = html[start..].find('"').unwrap();
    html[start..start + end].to_string()
}

/// Number of posts rendered in a listing.
pub fn article_count(html: &str) -> usize {
    html.matches(r#"<article class="post">"#).count()
}
