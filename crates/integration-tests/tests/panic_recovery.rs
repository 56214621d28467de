//! One panic boundary in front of everything.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::{Router, routing::get};
use http_body_util::BodyExt;
use snippetbox_web::pipeline::Pipeline;
use snippetbox_web::routes::standard_chain;
use tower::ServiceExt;

async fn explode() -> Response {
    panic!("handler bug");
}

fn app(served: &Arc<AtomicUsize>) -> Pipeline {
    let served = Arc::clone(served);
    let inner = Router::new().route("/boom", get(explode)).route(
        "/ok",
        get(move || {
            served.fetch_add(1, Ordering::SeqCst);
            async { "fine" }
        }),
    );
    standard_chain().then_service(inner)
}

fn get_request(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_panic_becomes_single_500_with_connection_close() {
    let served = Arc::new(AtomicUsize::new(0));
    let app = app(&served);

    let response = app.clone().oneshot(get_request("/boom")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["connection"], "close");
    assert_eq!(response.headers()["x-frame-options"], "deny");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), b"Internal Server Error");
}

#[tokio::test]
async fn test_later_requests_are_still_served() {
    let served = Arc::new(AtomicUsize::new(0));
    let app = app(&served);

    for _ in 0..3 {
        let crashed = app.clone().oneshot(get_request("/boom")).await.unwrap();
        assert_eq!(crashed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    let response = app.clone().oneshot(get_request("/ok")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("connection").is_none());
    assert_eq!(served.load(Ordering::SeqCst), 1);
}
