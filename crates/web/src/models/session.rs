//! Session keys shared by the pipeline stages and the handlers.

/// Id of the logged-in user (`i32`, absent or zero when logged out).
pub const AUTHENTICATED_USER_ID: &str = "authenticatedUserId";

/// One-shot message shown on the next rendered page.
pub const FLASH: &str = "flash";

/// Base64url-encoded per-session CSRF secret.
pub const CSRF_TOKEN: &str = "csrfToken";
