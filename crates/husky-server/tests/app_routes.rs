mod common;

use axum::http::StatusCode;
use common::client;

#[tokio::test]
async fn root_serves_base_test() {
    let mut client = client();
    let response = client.get("/").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "base test");
}

#[tokio::test]
async fn health_reports_ok() {
    let mut client = client();
    let response = client.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn unknown_path_renders_404_page() {
    let mut client = client();
    let response = client.get("/no/such/page").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains("404 Not Found"));
    assert!(response.body.contains("The requested URL was not found on the server."));
}

#[tokio::test]
async fn first_visit_issues_session_cookie() {
    let mut client = client();
    assert!(!client.has_session_cookie());
    client.get("/blog/").await;
    assert!(client.has_session_cookie());
}

#[tokio::test]
async fn blog_without_slash_redirects() {
    let mut client = client();
    let response = client.get("/blog").await;
    assert_eq!(response.status, StatusCode::PERMANENT_REDIRECT);
    assert_eq!(response.location.as_deref(), Some("/blog/"));
}

#[tokio::test]
async fn health_root_and_404_do_not_create_sessions() {
    let mut client = client();
    for _ in 0..20 {
        assert_eq!(client.get("/health").await.status, StatusCode::OK);
        assert_eq!(client.get("/").await.status, StatusCode::OK);
        assert_eq!(client.get("/nowhere").await.status, StatusCode::NOT_FOUND);
    }
    assert!(!client.has_session_cookie());
    assert_eq!(client.session_rows(), 0);
}

#[tokio::test]
async fn anonymous_visits_sweep_expired_sessions() {
    let mut client = client();
    for _ in 0..5 {
        client.forget_session();
        client.get("/blog/").await;
    }
    assert_eq!(client.session_rows(), 5);

    {
        let conn = client.pool.get().unwrap();
        conn.execute(
            "UPDATE sessions SET expires_at = ?1",
            [chrono::Utc::now() - chrono::Duration::days(1)],
        )
        .unwrap();
    }

    client.forget_session();
    client.get("/blog/").await;
    assert_eq!(client.session_rows(), 1);
}

#[tokio::test]
async fn static_files_are_served_without_a_session() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("style.css"), "body { color: #222; }").unwrap();

    let mut config = common::testing_config();
    config.server.static_dir = dir.path().to_str().unwrap().to_string();
    let mut client = common::client_with(config, |_| {});

    let response = client.get("/static/style.css").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "body { color: #222; }");
    assert!(!client.has_session_cookie());
    assert_eq!(client.session_rows(), 0);
}
