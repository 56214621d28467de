//! Signup, login and logout handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use snippetbox_core::Email;

use super::forms::{BLANK, FormErrors, min_chars, not_blank};
use super::page::{PageContext, session};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::auth::LOGIN_PATH;
use crate::models::session::AUTHENTICATED_USER_ID;
use crate::pipeline::RequestContext;
use crate::services::auth::{AuthError, MIN_PASSWORD_LENGTH};
use crate::state::AppState;

const INVALID_EMAIL: &str = "This field must be a valid email address";

/// Signup form data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login form data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub page: PageContext,
    pub form: SignupForm,
    pub errors: FormErrors,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub form: LoginForm,
    pub errors: FormErrors,
}

// =============================================================================
// Signup
// =============================================================================

pub async fn signup_page(ctx: RequestContext) -> Result<SignupTemplate> {
    Ok(SignupTemplate {
        page: PageContext::load(&ctx).await?,
        form: SignupForm::default(),
        errors: FormErrors::default(),
    })
}

/// Handle signup form submission.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    ctx: RequestContext,
    form: std::result::Result<Form<SignupForm>, FormRejection>,
) -> Result<Response> {
    let Form(form) = form.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut errors = FormErrors::default();
    errors.check(not_blank(&form.name), "name", BLANK);
    errors.check(not_blank(&form.email), "email", BLANK);
    let email = Email::parse(&form.email);
    errors.check(email.is_ok(), "email", INVALID_EMAIL);
    errors.check(not_blank(&form.password), "password", BLANK);
    errors.check(
        min_chars(&form.password, MIN_PASSWORD_LENGTH),
        "password",
        format!("This field must be at least {MIN_PASSWORD_LENGTH} characters long"),
    );

    let email = match email {
        Ok(email) if errors.is_valid() => email,
        _ => return render_signup(&ctx, form, errors).await,
    };

    match state
        .users()
        .insert(&form.name, &email, &form.password)
        .await
    {
        Ok(_) => {}
        Err(AuthError::DuplicateEmail) => {
            errors.add_field("email", "Email address is already in use");
            return render_signup(&ctx, form, errors).await;
        }
        Err(e) => return Err(e.into()),
    }

    session(&ctx)?
        .put_flash("Your signup was successful. Please log in.")
        .await?;

    Ok(Redirect::to(LOGIN_PATH).into_response())
}

async fn render_signup(
    ctx: &RequestContext,
    mut form: SignupForm,
    errors: FormErrors,
) -> Result<Response> {
    form.password.clear();
    let page = PageContext::load(ctx).await?;
    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        SignupTemplate { page, form, errors },
    )
        .into_response())
}

// =============================================================================
// Login / Logout
// =============================================================================

pub async fn login_page(ctx: RequestContext) -> Result<LoginTemplate> {
    Ok(LoginTemplate {
        page: PageContext::load(&ctx).await?,
        form: LoginForm::default(),
        errors: FormErrors::default(),
    })
}

/// Handle login form submission.
///
/// On success the session token is renewed before the user id is stored.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    form: std::result::Result<Form<LoginForm>, FormRejection>,
) -> Result<Response> {
    let Form(form) = form.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut errors = FormErrors::default();
    errors.check(not_blank(&form.email), "email", BLANK);
    let email = Email::parse(&form.email);
    errors.check(email.is_ok(), "email", INVALID_EMAIL);
    errors.check(not_blank(&form.password), "password", BLANK);

    let email = match email {
        Ok(email) if errors.is_valid() => email,
        _ => return render_login(&ctx, form, errors).await,
    };

    let user_id = match state.users().authenticate(&email, &form.password).await {
        Ok(id) => id,
        Err(AuthError::InvalidCredentials) => {
            tracing::debug!("Login rejected");
            errors.add_non_field("Email or password is incorrect");
            return render_login(&ctx, form, errors).await;
        }
        Err(e) => return Err(e.into()),
    };

    let session = session(&ctx)?;
    session.renew().await?;
    session.put(AUTHENTICATED_USER_ID, user_id).await?;
    set_sentry_user(&user_id);
    tracing::info!(user_id = %user_id, "User logged in");

    Ok(Redirect::to("/snippet/create").into_response())
}

async fn render_login(
    ctx: &RequestContext,
    mut form: LoginForm,
    errors: FormErrors,
) -> Result<Response> {
    form.password.clear();
    let page = PageContext::load(ctx).await?;
    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        LoginTemplate { page, form, errors },
    )
        .into_response())
}

/// Log out: renew the token, drop the user id, flash a confirmation.
#[instrument(skip_all)]
pub async fn logout(ctx: RequestContext) -> Result<Response> {
    let session = session(&ctx)?;
    session.renew().await?;
    session.remove(AUTHENTICATED_USER_ID).await?;
    session
        .put_flash("You've been logged out successfully!")
        .await?;
    clear_sentry_user();

    Ok(Redirect::to("/").into_response())
}
