//! Pipeline stages for snippetbox.
//!
//! # Chains
//!
//! Standard (every request):
//! 1. [`RecoverPanic`] (outermost panic boundary)
//! 2. [`LogRequest`] (one line per request)
//! 3. [`SecureHeaders`] (fixed hardening headers)
//!
//! Dynamic (session-aware routes, inside the standard chain):
//! 1. [`LoadAndSave`] (load session, save on the way out)
//! 2. [`CsrfProtect`] (token issue and check)
//! 3. [`Authenticate`] (resolve `authenticatedUserId`)
//!
//! Guards ([`RequireAuthentication`], [`RequireUnauthentication`]) extend the
//! dynamic chain per route.

pub mod auth;
pub mod csrf;
pub mod logging;
pub mod recover;
pub mod security_headers;
pub mod session;

pub use auth::{Authenticate, RequireAuthentication, RequireUnauthentication};
pub use csrf::CsrfProtect;
pub use logging::LogRequest;
pub use recover::RecoverPanic;
pub use security_headers::SecureHeaders;
pub use session::{LoadAndSave, SessionHandle, spawn_expired_deletion};
