//! Snippet view and create handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use snippetbox_core::{SnippetId, SnippetLifetime};

use super::forms::{BLANK, FormErrors, max_chars, not_blank};
use super::page::{PageContext, session};
use crate::error::{AppError, Result};
use crate::models::Snippet;
use crate::pipeline::RequestContext;
use crate::state::AppState;

/// Longest permitted title, in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Snippet creation form data.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnippetForm {
    pub title: String,
    pub content: String,
    pub expires: i32,
}

impl Default for SnippetForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            expires: SnippetLifetime::DEFAULT.days(),
        }
    }
}

/// Snippet detail template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/view.html")]
pub struct ViewTemplate {
    pub page: PageContext,
    pub snippet: Snippet,
}

/// Snippet creation template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/create.html")]
pub struct CreateTemplate {
    pub page: PageContext,
    pub form: SnippetForm,
    pub errors: FormErrors,
}

/// Show one snippet. Non-numeric, non-positive and unknown ids are 404s.
#[instrument(skip(state, ctx))]
pub async fn view(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<ViewTemplate> {
    let id = SnippetId::parse_positive(&id)
        .ok_or_else(|| AppError::NotFound(format!("snippet id '{id}'")))?;
    let snippet = state.snippets().get(id).await?;

    Ok(ViewTemplate {
        page: PageContext::load(&ctx).await?,
        snippet,
    })
}

/// Empty creation form, one-year expiry pre-selected.
pub async fn create_page(ctx: RequestContext) -> Result<CreateTemplate> {
    Ok(CreateTemplate {
        page: PageContext::load(&ctx).await?,
        form: SnippetForm::default(),
        errors: FormErrors::default(),
    })
}

/// Validate and store a new snippet.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    form: std::result::Result<Form<SnippetForm>, FormRejection>,
) -> Result<Response> {
    let Form(form) = form.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut errors = FormErrors::default();
    errors.check(not_blank(&form.title), "title", BLANK);
    errors.check(
        max_chars(&form.title, MAX_TITLE_CHARS),
        "title",
        format!("This field cannot be more than {MAX_TITLE_CHARS} characters long"),
    );
    errors.check(not_blank(&form.content), "content", BLANK);
    let lifetime = SnippetLifetime::try_from(form.expires);
    errors.check(lifetime.is_ok(), "expires", "This field must equal 1, 7 or 365");

    let lifetime = match lifetime {
        Ok(lifetime) if errors.is_valid() => lifetime,
        _ => {
            let page = PageContext::load(&ctx).await?;
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                CreateTemplate { page, form, errors },
            )
                .into_response());
        }
    };

    let id = state
        .snippets()
        .insert(&form.title, &form.content, lifetime)
        .await?;
    tracing::info!(snippet_id = %id, "Snippet created");

    session(&ctx)?
        .put_flash("Snippet successfully created!")
        .await?;

    Ok(Redirect::to(&format!("/snippet/view/{id}")).into_response())
}
