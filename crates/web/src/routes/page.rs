//! Data shared by every rendered page.

use chrono::Datelike;

use crate::error::{AppError, Result};
use crate::middleware::SessionHandle;
use crate::pipeline::RequestContext;

/// Fields the base layout reads.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub current_year: i32,
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub csrf_token: String,
}

impl PageContext {
    /// Build the page data, consuming any pending flash message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the flash cannot be read.
    pub async fn load(ctx: &RequestContext) -> Result<Self> {
        let flash = match ctx.session() {
            Some(session) => session.pop_flash().await?,
            None => None,
        };

        Ok(Self {
            current_year: chrono::Utc::now().year(),
            flash,
            is_authenticated: ctx.is_authenticated(),
            csrf_token: ctx.csrf_token().to_owned(),
        })
    }
}

/// The session of a handler mounted on the dynamic chain.
///
/// # Errors
///
/// Returns `AppError::Internal` for a handler mounted without the session
/// stage.
pub fn session(ctx: &RequestContext) -> Result<&SessionHandle> {
    ctx.session()
        .ok_or_else(|| AppError::Internal("handler requires a session".to_owned()))
}
