//! Login, logout, route guards and stale identities.

use axum::http::StatusCode;
use snippetbox_integration_tests::{Client, TestApp};
use tower_sessions::SessionStore;
use tower_sessions::session::{Id, Record};

const USER_KEY: &str = "authenticatedUserId";

fn session_id(client: &Client) -> Id {
    let cookie = client.cookie().unwrap();
    let value = cookie.strip_prefix("session=").unwrap();
    value.parse().unwrap()
}

async fn record(app: &TestApp, id: &Id) -> Option<Record> {
    app.sessions.load(id).await.unwrap()
}

#[tokio::test]
async fn test_anonymous_is_redirected_to_login() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client.get("/snippet/create").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/user/login"));

    let home = client.get("/").await;
    assert!(home.csrf_token().is_none());
    assert!(home.body.contains(r#"href="/user/login""#));
}

#[tokio::test]
async fn test_anonymous_logout_is_redirected_to_login() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client.submit("/user/login", "/user/logout", &[]).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/user/login"));
}

#[tokio::test]
async fn test_login_rotates_token_and_stores_user() {
    let (app, user_id) = TestApp::with_user().await;
    let mut client = app.client();

    client.get("/user/login").await;
    let before = session_id(&client);

    let response = client.login().await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/snippet/create"));

    let after = session_id(&client);
    assert_ne!(before, after);
    assert!(record(&app, &before).await.is_none());

    let stored = record(&app, &after).await.unwrap();
    assert_eq!(stored.data[USER_KEY], user_id.as_i32());
}

#[tokio::test]
async fn test_authenticated_pages_are_not_cached_and_guests_pages_redirect() {
    let (app, _) = TestApp::with_user().await;
    let mut client = app.client();
    client.login().await;

    let create = client.get("/snippet/create").await;
    assert_eq!(create.status, StatusCode::OK);
    assert_eq!(create.header("cache-control"), Some("no-store"));
    assert!(create.body.contains("Logout"));

    for path in ["/user/login", "/user/signup"] {
        let response = client.get(path).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "{path}");
        assert_eq!(response.location(), Some("/"));
    }

    let home = client.get("/").await;
    assert!(home.header("cache-control").is_none());
}

#[tokio::test]
async fn test_logout_rotates_token_and_removes_user() {
    let (app, _) = TestApp::with_user().await;
    let mut client = app.client();
    client.login().await;
    let logged_in = session_id(&client);

    let response = client.submit("/snippet/create", "/user/logout", &[]).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/"));

    let logged_out = session_id(&client);
    assert_ne!(logged_in, logged_out);
    assert!(record(&app, &logged_in).await.is_none());
    let stored = record(&app, &logged_out).await.unwrap();
    assert!(!stored.data.contains_key(USER_KEY));

    let home = client.get("/").await;
    assert!(home.body.contains("logged out successfully"));

    let create = client.get("/snippet/create").await;
    assert_eq!(create.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_wrong_password_rerenders_login() {
    let (app, _) = TestApp::with_user().await;
    let mut client = app.client();

    let response = client
        .submit(
            "/user/login",
            "/user/login",
            &[("email", "alice@example.com"), ("password", "wrong-password")],
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("Email or password is incorrect"));
    assert!(response.body.contains(r#"value="alice@example.com""#));
}

#[tokio::test]
async fn test_deleted_user_is_treated_as_anonymous() {
    let (app, user_id) = TestApp::with_user().await;
    let mut client = app.client();
    client.login().await;

    app.users.remove(user_id);

    let response = client.get("/snippet/create").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/user/login"));

    // Guest pages open up again; the stale key itself is left in place.
    let login = client.get("/user/login").await;
    assert_eq!(login.status, StatusCode::OK);
    let stored = record(&app, &session_id(&client)).await.unwrap();
    assert!(stored.data.contains_key(USER_KEY));
}
