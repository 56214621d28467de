//! Per-request state threaded through a pipeline.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::middleware::session::SessionHandle;

/// Request-scoped state handed from stage to stage.
///
/// A context starts empty when a pipeline is entered and is only ever
/// extended: each `with_*` method consumes the value and returns a new one,
/// so a stage can only influence what later stages see. The terminal
/// endpoint receives the final value through request extensions.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    session: Option<SessionHandle>,
    csrf_token: Option<String>,
    authenticated: bool,
}

impl RequestContext {
    /// Attach the visitor's session.
    #[must_use]
    pub fn with_session(self, session: SessionHandle) -> Self {
        Self {
            session: Some(session),
            ..self
        }
    }

    /// Attach the masked CSRF token to embed in forms.
    #[must_use]
    pub fn with_csrf_token(self, token: String) -> Self {
        Self {
            csrf_token: Some(token),
            ..self
        }
    }

    /// Mark the request as coming from a verified, existing user.
    #[must_use]
    pub fn with_authenticated(self) -> Self {
        Self {
            authenticated: true,
            ..self
        }
    }

    /// The visitor's session, present inside the dynamic chain.
    #[must_use]
    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Masked CSRF token, or an empty string outside the dynamic chain.
    #[must_use]
    pub fn csrf_token(&self) -> &str {
        self.csrf_token.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// Extractor for terminal handlers mounted with [`super::Chain::then`].
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!("request context not found - handler mounted outside a pipeline");
            Self::default()
        }))
    }
}
