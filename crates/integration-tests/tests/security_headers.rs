//! Hardening headers on every response, whatever produced it.

use axum::body::Body;
use axum::http::{Method, StatusCode};
use snippetbox_integration_tests::{TestApp, TestResponse};

const EXPECTED: [(&str, &str); 5] = [
    (
        "content-security-policy",
        "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com",
    ),
    ("referrer-policy", "origin-when-cross-origin"),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "deny"),
    ("x-xss-protection", "0"),
];

fn assert_hardened(response: &TestResponse) {
    for (name, value) in EXPECTED {
        assert_eq!(
            response.header(name),
            Some(value),
            "{name} on a {} response",
            response.status
        );
        assert_eq!(response.headers.get_all(name).iter().count(), 1);
    }
}

#[tokio::test]
async fn test_headers_on_pages_and_ping() {
    let app = TestApp::new();
    let mut client = app.client();

    let home = client.get("/").await;
    assert_eq!(home.status, StatusCode::OK);
    assert_hardened(&home);

    let ping = client.get("/ping").await;
    assert_eq!(ping.status, StatusCode::OK);
    assert_hardened(&ping);
}

#[tokio::test]
async fn test_headers_on_not_found_and_method_not_allowed() {
    let app = TestApp::new();
    let mut client = app.client();

    let missing = client.get("/no/such/page").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_hardened(&missing);

    let request = client.request(Method::DELETE, "/ping").body(Body::empty()).unwrap();
    let wrong_method = client.send(request).await;
    assert_eq!(wrong_method.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_hardened(&wrong_method);
}

#[tokio::test]
async fn test_headers_on_static_assets() {
    let app = TestApp::new();
    let response = app.client().get("/static/css/main.css").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("font-family"));
    assert_hardened(&response);
}

#[tokio::test]
async fn test_headers_on_redirects_and_csrf_failures() {
    let app = TestApp::new();
    let mut client = app.client();

    let redirect = client.get("/snippet/create").await;
    assert_eq!(redirect.status, StatusCode::SEE_OTHER);
    assert_hardened(&redirect);

    let rejected = client.post_form("/user/login", &[("email", "a@b.co")]).await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_hardened(&rejected);
}
