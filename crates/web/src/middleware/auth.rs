//! Authentication stage and route guards.
//!
//! [`Authenticate`] resolves `authenticatedUserId` against the user
//! directory once per request and records the outcome in the
//! [`RequestContext`]. The guards only read that flag.
//!
//! ```text
//! Start ─► SessionLoaded ─► IdentityChecked ─┬─► Unauthenticated
//!                                            └─► Authenticated
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderValue, header::CACHE_CONTROL},
    response::{IntoResponse, Redirect, Response},
};

use crate::error::AppError;
use crate::pipeline::{Next, RequestContext, Stage};
use crate::services::auth::UserDirectory;

/// Where unauthenticated visitors are sent.
pub const LOGIN_PATH: &str = "/user/login";

/// Marks the context authenticated when the session names an existing user.
///
/// A session whose user no longer exists continues unauthenticated; the
/// stale id is left in the session.
#[derive(Clone)]
pub struct Authenticate {
    users: Arc<dyn UserDirectory>,
}

impl Authenticate {
    #[must_use]
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Stage for Authenticate {
    async fn call(&self, request: Request, ctx: RequestContext, next: Next) -> Response {
        let Some(session) = ctx.session().cloned() else {
            return next.run(request, ctx).await;
        };

        let user_id = match session.user_id().await {
            Ok(id) => id,
            Err(e) => return AppError::Session(e).into_response(),
        };
        if !user_id.is_set() {
            return next.run(request, ctx).await;
        }

        match self.users.exists(user_id).await {
            Ok(true) => next.run(request, ctx.with_authenticated()).await,
            Ok(false) => {
                tracing::debug!(user_id = %user_id, "session names a user that no longer exists");
                next.run(request, ctx).await
            }
            Err(e) => AppError::Database(e).into_response(),
        }
    }
}

/// Only lets authenticated visitors through; marks responses uncacheable.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireAuthentication;

#[async_trait]
impl Stage for RequireAuthentication {
    async fn call(&self, request: Request, ctx: RequestContext, next: Next) -> Response {
        if !ctx.is_authenticated() {
            return Redirect::to(LOGIN_PATH).into_response();
        }

        let mut response = next.run(request, ctx).await;
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

/// Sends authenticated visitors to the home page.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireUnauthentication;

#[async_trait]
impl Stage for RequireUnauthentication {
    async fn call(&self, request: Request, ctx: RequestContext, next: Next) -> Response {
        if ctx.is_authenticated() {
            return Redirect::to("/").into_response();
        }
        next.run(request, ctx).await
    }
}
