mod common;

use axum::http::StatusCode;
use common::client;

#[tokio::test]
async fn register_logs_in_and_greets() {
    let mut client = client();

    let response = client.register("alice", "secret123").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/blog/"));

    let page = client.get("/blog/").await;
    assert!(page.body.contains("Welcome, alice!"));
    assert!(page.body.contains("Logout"));

    // Flash is shown once.
    let again = client.get("/blog/").await;
    assert!(!again.body.contains("Welcome, alice!"));
}

#[tokio::test]
async fn register_rejects_invalid_and_duplicate_users() {
    let mut client = client();

    let response = client
        .post_form(
            "/auth/register",
            &[
                ("username", "bad name"),
                ("email", "nope"),
                ("name", "Bad"),
                ("password", "short"),
                ("password2", "short"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Username may only contain letters, digits and underscores."));
    assert!(response.body.contains("Invalid email address."));
    assert!(response.body.contains("Password must be between"));
    assert!(response.body.contains(r#"value="bad name""#));

    client.register("alice", "secret123").await;
    client.logout().await;

    let duplicate = client.register("alice", "secret123").await;
    assert_eq!(duplicate.status, StatusCode::OK);
    assert!(duplicate.body.contains("field-error"));
}

#[tokio::test]
async fn login_and_logout_round_trip() {
    let mut client = client();
    client.register("alice", "secret123").await;
    let response = client.logout().await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);

    let page = client.get("/blog/").await;
    assert!(page.body.contains("Logout success."));
    assert!(page.body.contains(r#"href="/auth/login""#));

    let wrong = client.login("alice", "wrong-password").await;
    assert_eq!(wrong.status, StatusCode::OK);
    assert!(wrong.body.contains("Invalid username or password."));

    let ok = client.login("alice", "secret123").await;
    assert_eq!(ok.status, StatusCode::SEE_OTHER);
    assert_eq!(ok.location.as_deref(), Some("/blog/"));

    let page = client.get("/blog/").await;
    assert!(page.body.contains("Login success."));
}

#[tokio::test]
async fn login_required_redirects_with_next_and_flash() {
    let mut client = client();

    let response = client.get("/blog/post/new").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        response.location.as_deref(),
        Some("/auth/login?next=%2Fblog%2Fpost%2Fnew")
    );

    let login = client.get("/auth/login?next=%2Fblog%2Fpost%2Fnew").await;
    assert!(login.body.contains("Please log in to access this page."));
    assert!(login.body.contains(r#"name="next" value="/blog/post/new""#));
}

#[tokio::test]
async fn login_follows_local_next_only() {
    let mut client = client();
    client.register("alice", "secret123").await;
    client.logout().await;

    let response = client
        .post_form(
            "/auth/login",
            &[
                ("username", "alice"),
                ("password", "secret123"),
                ("next", "/blog/post/new"),
            ],
        )
        .await;
    assert_eq!(response.location.as_deref(), Some("/blog/post/new"));

    client.logout().await;
    let response = client
        .post_form(
            "/auth/login",
            &[
                ("username", "alice"),
                ("password", "secret123"),
                ("next", "https://evil.example/"),
            ],
        )
        .await;
    assert_eq!(response.location.as_deref(), Some("/blog/"));
}

#[tokio::test]
async fn logout_requires_login() {
    let mut client = client();
    let response = client.logout().await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert!(response
        .location
        .as_deref()
        .unwrap()
        .starts_with("/auth/login?next="));
}

fn user_session_lifetime(client: &common::TestClient) -> chrono::Duration {
    let conn = client.pool.get().unwrap();
    let expires_at: chrono::DateTime<chrono::Utc> = conn
        .query_row(
            "SELECT expires_at FROM sessions WHERE user_id IS NOT NULL",
            [],
            |row| row.get(0),
        )
        .unwrap();
    expires_at - chrono::Utc::now()
}

#[tokio::test]
async fn remember_me_extends_session_lifetime() {
    let mut client = client();
    client.register("alice", "secret123").await;
    client.logout().await;

    let short = client.login("alice", "secret123").await;
    assert_eq!(short.status, StatusCode::SEE_OTHER);
    assert!(short
        .session_cookie
        .as_deref()
        .unwrap()
        .contains("; Max-Age=86400"));
    let lifetime = user_session_lifetime(&client);
    assert!(lifetime <= chrono::Duration::hours(24));
    assert!(lifetime > chrono::Duration::hours(23));

    client.logout().await;
    let long = client
        .post_form(
            "/auth/login",
            &[
                ("username", "alice"),
                ("password", "secret123"),
                ("remember", "y"),
            ],
        )
        .await;
    assert_eq!(long.status, StatusCode::SEE_OTHER);
    assert!(long
        .session_cookie
        .as_deref()
        .unwrap()
        .contains("; Max-Age=2592000"));
    let lifetime = user_session_lifetime(&client);
    assert!(lifetime <= chrono::Duration::days(30));
    assert!(lifetime > chrono::Duration::days(29));
}
