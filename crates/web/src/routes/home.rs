//! Home page, liveness probe and the not-found fallback.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
};
use tracing::instrument;

use super::page::PageContext;
use crate::error::{Result, status_text};
use crate::models::Snippet;
use crate::pipeline::RequestContext;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub snippets: Vec<Snippet>,
}

/// List the latest snippets.
#[instrument(skip_all)]
pub async fn home(State(state): State<AppState>, ctx: RequestContext) -> Result<HomeTemplate> {
    let snippets = state.snippets().latest().await?;

    Ok(HomeTemplate {
        page: PageContext::load(&ctx).await?,
        snippets,
    })
}

/// Liveness check, served without session or CSRF handling.
pub async fn ping() -> &'static str {
    "OK"
}

/// Fallback for unmatched paths.
pub async fn not_found() -> Response {
    status_text(StatusCode::NOT_FOUND)
}
