//! CSRF protection bound to the session.
//!
//! Each session holds one random 32-byte secret under `csrfToken`. Every
//! request gets a freshly masked copy of it for embedding in forms:
//!
//! ```text
//! token = base64url( mask || (mask XOR secret) )
//! ```
//!
//! Unsafe methods must echo a token back in the `X-CSRF-Token` header or the
//! `csrf_token` form field; it is unmasked and compared to the secret in
//! constant time. Masking keeps the rendered token different on every page
//! while any of them validates for the session.

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::error::{AppError, status_text};
use crate::middleware::session::SessionHandle;
use crate::models::session::CSRF_TOKEN;
use crate::pipeline::{Next, RequestContext, Stage};

/// Header checked for a submitted token.
pub const HEADER_NAME: &str = "x-csrf-token";

/// Form field checked for a submitted token.
pub const FORM_FIELD: &str = "csrf_token";

const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

const SECRET_LEN: usize = 32;

/// Largest form body buffered while looking for the token.
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Rejects unsafe requests that do not carry the session's CSRF token.
///
/// Must run after [`super::LoadAndSave`]; without a session in the context
/// every request fails with a 500.
#[derive(Debug, Clone, Copy)]
pub struct CsrfProtect {
    body_limit: usize,
}

impl Default for CsrfProtect {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl CsrfProtect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

#[async_trait]
impl Stage for CsrfProtect {
    async fn call(&self, request: Request, ctx: RequestContext, next: Next) -> Response {
        let Some(session) = ctx.session().cloned() else {
            return AppError::Internal("CSRF stage reached without a session".to_owned())
                .into_response();
        };

        let secret = match ensure_secret(&session).await {
            Ok(secret) => secret,
            Err(e) => return AppError::Session(e).into_response(),
        };
        let ctx = ctx.with_csrf_token(mask(&secret));

        if is_safe(request.method()) {
            return next.run(request, ctx).await;
        }

        let (request, submitted) = match submitted_token(request, self.body_limit).await {
            Ok(found) => found,
            Err(response) => return response,
        };

        if submitted.as_deref().is_some_and(|token| verify(token, &secret)) {
            return next.run(request, ctx).await;
        }

        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            token_present = submitted.is_some(),
            "CSRF token missing or invalid"
        );
        status_text(StatusCode::BAD_REQUEST)
    }
}

fn is_safe(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Load the session secret, creating one if the session has none.
async fn ensure_secret(
    session: &SessionHandle,
) -> Result<[u8; SECRET_LEN], tower_sessions::session::Error> {
    if let Some(stored) = session.get::<String>(CSRF_TOKEN).await?
        && let Some(secret) = decode_exact::<SECRET_LEN>(&stored)
    {
        return Ok(secret);
    }

    let mut secret = [0u8; SECRET_LEN];
    rand::rng().fill_bytes(&mut secret);
    session
        .put(CSRF_TOKEN, URL_SAFE_NO_PAD.encode(secret))
        .await?;
    Ok(secret)
}

/// Produce a per-request masked token for `secret`.
fn mask(secret: &[u8; SECRET_LEN]) -> String {
    let mut token = [0u8; SECRET_LEN * 2];
    let (pad, masked) = token.split_at_mut(SECRET_LEN);
    rand::rng().fill_bytes(pad);
    for ((out, p), s) in masked.iter_mut().zip(pad.iter()).zip(secret) {
        *out = p ^ s;
    }
    URL_SAFE_NO_PAD.encode(token)
}

/// Recover the secret from a masked token.
fn unmask(token: &str) -> Option<[u8; SECRET_LEN]> {
    let raw = decode_exact::<{ SECRET_LEN * 2 }>(token)?;
    let (pad, masked) = raw.split_at(SECRET_LEN);
    let mut secret = [0u8; SECRET_LEN];
    for ((out, p), m) in secret.iter_mut().zip(pad).zip(masked) {
        *out = p ^ m;
    }
    Some(secret)
}

fn verify(token: &str, secret: &[u8; SECRET_LEN]) -> bool {
    unmask(token).is_some_and(|candidate| candidate.as_slice().ct_eq(secret.as_slice()).into())
}

fn decode_exact<const N: usize>(encoded: &str) -> Option<[u8; N]> {
    URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
}

/// Find the submitted token, buffering a urlencoded body if necessary.
///
/// The request is rebuilt with the buffered body so the handler can still
/// decode the form.
async fn submitted_token(
    request: Request,
    limit: usize,
) -> Result<(Request, Option<String>), Response> {
    if let Some(token) = request
        .headers()
        .get(HEADER_NAME)
        .and_then(|value| value.to_str().ok())
    {
        let token = token.to_owned();
        return Ok((request, Some(token)));
    }

    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(is_form_media_type);
    if !is_form {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, "could not buffer form body");
        status_text(StatusCode::BAD_REQUEST)
    })?;

    let token = url::form_urlencoded::parse(&bytes)
        .find(|(key, _)| *key == FORM_FIELD)
        .map(|(_, value)| value.into_owned());

    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

/// Media types compare case-insensitively and parameters are ignored.
fn is_form_media_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(FORM_MEDIA_TYPE))
}
