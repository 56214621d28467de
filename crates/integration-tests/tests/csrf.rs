//! CSRF rejection happens before any handler runs.

use axum::http::StatusCode;
use snippetbox_core::Email;
use snippetbox_integration_tests::{PASSWORD, TestApp};
use snippetbox_web::services::auth::UserDirectory;

const NEW_EMAIL: &str = "bob@example.com";

async fn bob_was_registered(app: &TestApp) -> bool {
    app.users
        .authenticate(&Email::parse(NEW_EMAIL).unwrap(), PASSWORD)
        .await
        .is_ok()
}

fn signup_fields() -> [(&'static str, &'static str); 3] {
    [("name", "Bob"), ("email", NEW_EMAIL), ("password", PASSWORD)]
}

#[tokio::test]
async fn test_missing_token_is_rejected_and_handler_not_invoked() {
    let app = TestApp::new();
    let mut client = app.client();
    client.get("/user/signup").await;

    let response = client.post_form("/user/signup", &signup_fields()).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, "Bad Request");
    assert!(!bob_was_registered(&app).await);
}

#[tokio::test]
async fn test_mismatched_token_is_rejected() {
    let app = TestApp::new();
    let mut victim = app.client();
    let mut attacker = app.client();

    victim.get("/user/signup").await;
    let foreign = attacker.get("/user/signup").await.csrf_token().unwrap();

    let mut fields: Vec<(&str, &str)> = signup_fields().to_vec();
    fields.push(("csrf_token", foreign.as_str()));
    let response = victim.post_form("/user/signup", &fields).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(!bob_was_registered(&app).await);
}

#[tokio::test]
async fn test_post_without_any_session_is_rejected() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client
        .post_form("/user/signup", &[("csrf_token", "AAAA"), ("name", "Bob")])
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(!bob_was_registered(&app).await);
}

#[tokio::test]
async fn test_valid_token_reaches_handler() {
    let app = TestApp::new();
    let mut client = app.client();

    let response = client
        .submit("/user/signup", "/user/signup", &signup_fields())
        .await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert!(bob_was_registered(&app).await);
}

#[tokio::test]
async fn test_token_changes_per_page_but_stays_valid() {
    let app = TestApp::new();
    let mut client = app.client();

    let first = client.get("/user/signup").await.csrf_token().unwrap();
    let second = client.get("/user/signup").await.csrf_token().unwrap();
    assert_ne!(first, second);

    let mut fields: Vec<(&str, &str)> = signup_fields().to_vec();
    fields.push(("csrf_token", first.as_str()));
    let response = client.post_form("/user/signup", &fields).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
}
