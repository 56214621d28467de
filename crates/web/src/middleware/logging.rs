//! Request logging stage.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request},
    response::Response,
};

use crate::pipeline::{Next, RequestContext, Stage};

/// Emits one `info` event per request before calling through.
///
/// The remote address comes from axum's `ConnectInfo`, which is present
/// when the server is started with
/// `into_make_service_with_connect_info::<SocketAddr>()`; otherwise `-` is
/// logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRequest;

#[async_trait]
impl Stage for LogRequest {
    async fn call(&self, request: Request, ctx: RequestContext, next: Next) -> Response {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "-".to_owned(), |ConnectInfo(addr)| addr.to_string());

        tracing::info!(
            ip = %remote_addr,
            proto = ?request.version(),
            method = %request.method(),
            uri = %request.uri(),
            "received request"
        );

        next.run(request, ctx).await
    }
}
