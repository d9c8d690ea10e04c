use chrono::{Duration, Utc};
use husky_auth::{
    authenticate, create_session, create_user, delete_session, get_user_by_username,
    load_session, login_session, prune_expired, set_flash, take_flash, AuthError, NewUser,
};
use husky_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use husky_types::{Flash, FlashKind};

fn setup() -> DbPool {
    let pool = create_pool(":memory:", DbRuntimeSettings::default()).unwrap();
    run_migrations(&pool.get().unwrap()).unwrap();
    pool
}

fn grey() -> NewUser {
    NewUser {
        username: "grey".to_string(),
        email: "grey@example.com".to_string(),
        name: "Grey Li".to_string(),
        password: "dog-and-cat".to_string(),
        password2: "dog-and-cat".to_string(),
    }
}

#[test]
fn register_then_authenticate() {
    let pool = setup();
    let conn = pool.get().unwrap();

    let user = create_user(&conn, &grey()).expect("registration should succeed");
    assert_eq!(user.username, "grey");
    assert_eq!(user.name, "Grey Li");

    let logged_in = authenticate(&conn, "grey", "dog-and-cat").expect("login should succeed");
    assert_eq!(logged_in, user);

    assert_eq!(get_user_by_username(&conn, "grey").unwrap().id, user.id);
}

#[test]
fn wrong_password_and_unknown_user_look_the_same() {
    let pool = setup();
    let conn = pool.get().unwrap();
    create_user(&conn, &grey()).unwrap();

    let wrong = authenticate(&conn, "grey", "not-the-password").unwrap_err();
    let unknown = authenticate(&conn, "nobody", "dog-and-cat").unwrap_err();
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert_eq!(wrong.to_string(), unknown.to_string());
}

#[test]
fn duplicate_username_and_email_conflict() {
    let pool = setup();
    let conn = pool.get().unwrap();
    create_user(&conn, &grey()).unwrap();

    match create_user(&conn, &grey()) {
        Err(AuthError::Conflict(err)) => assert_eq!(err.field, "username"),
        other => panic!("expected username conflict, got {other:?}"),
    }

    let mut same_email = grey();
    same_email.username = "grey2".to_string();
    same_email.email = "GREY@example.com".to_string();
    match create_user(&conn, &same_email) {
        Err(AuthError::Conflict(err)) => assert_eq!(err.field, "email"),
        other => panic!("expected email conflict, got {other:?}"),
    }
}

#[test]
fn invalid_registration_is_not_stored() {
    let pool = setup();
    let conn = pool.get().unwrap();

    let mut bad = grey();
    bad.password2 = "mismatch!".to_string();
    assert!(matches!(
        create_user(&conn, &bad),
        Err(AuthError::Validation(_))
    ));
    assert!(matches!(
        get_user_by_username(&conn, "grey"),
        Err(AuthError::NotFound(_))
    ));
}

#[test]
fn session_lifecycle() {
    let pool = setup();
    let conn = pool.get().unwrap();

    let issued = create_session(&conn, None, Duration::hours(1)).unwrap();
    let loaded = load_session(&conn, &issued.token, Utc::now())
        .unwrap()
        .expect("session should load");
    assert_eq!(loaded, issued.session);
    assert_eq!(loaded.user_id, None);

    assert!(load_session(&conn, "bogus-token", Utc::now()).unwrap().is_none());

    delete_session(&conn, &loaded.token_hash).unwrap();
    assert!(load_session(&conn, &issued.token, Utc::now()).unwrap().is_none());
}

#[test]
fn expired_sessions_are_invisible_and_pruned() {
    let pool = setup();
    let conn = pool.get().unwrap();

    let issued = create_session(&conn, None, Duration::minutes(5)).unwrap();
    let later = Utc::now() + Duration::minutes(10);
    assert!(load_session(&conn, &issued.token, later).unwrap().is_none());

    assert_eq!(prune_expired(&conn, later).unwrap(), 1);
    assert_eq!(prune_expired(&conn, later).unwrap(), 0);
}

fn session_rows(conn: &rusqlite::Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn issuing_a_session_sweeps_expired_ones() {
    let pool = setup();
    let conn = pool.get().unwrap();

    for _ in 0..5 {
        create_session(&conn, None, Duration::seconds(-1)).unwrap();
    }
    // Each issue sweeps the rows that expired before it.
    assert_eq!(session_rows(&conn), 1);

    let live = create_session(&conn, None, Duration::hours(1)).unwrap();
    assert_eq!(session_rows(&conn), 1);
    assert!(load_session(&conn, &live.token, Utc::now()).unwrap().is_some());

    create_session(&conn, None, Duration::hours(1)).unwrap();
    assert_eq!(session_rows(&conn), 2, "live sessions are kept");
}

#[test]
fn unrepresentable_lifetime_is_an_error() {
    let pool = setup();
    let conn = pool.get().unwrap();

    let err = create_session(&conn, None, Duration::days(365 * 300_000)).unwrap_err();
    assert!(matches!(err, AuthError::SessionLifetime));
    assert_eq!(session_rows(&conn), 0);
}

#[test]
fn login_rotates_token_and_keeps_flash() {
    let pool = setup();
    let conn = pool.get().unwrap();
    let user = create_user(&conn, &grey()).unwrap();

    let anon = create_session(&conn, None, Duration::hours(1)).unwrap();
    set_flash(
        &conn,
        &anon.session.token_hash,
        &Flash::new(FlashKind::Success, "Welcome"),
    )
    .unwrap();

    let logged_in = login_session(
        &conn,
        Some(&anon.session.token_hash),
        user.id,
        Duration::days(1),
    )
    .unwrap();

    assert_ne!(logged_in.token, anon.token);
    assert_ne!(logged_in.session.csrf_token, anon.session.csrf_token);
    assert!(load_session(&conn, &anon.token, Utc::now()).unwrap().is_none());

    let session = load_session(&conn, &logged_in.token, Utc::now())
        .unwrap()
        .unwrap();
    assert_eq!(session.user_id, Some(user.id));

    let flash = take_flash(&conn, &session.token_hash).unwrap();
    assert_eq!(flash, Some(Flash::new(FlashKind::Success, "Welcome")));
    assert_eq!(take_flash(&conn, &session.token_hash).unwrap(), None);
}
