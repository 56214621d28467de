//! HTTP routes for snippetbox.
//!
//! # Route Structure
//!
//! ```text
//! GET       /                    - Latest snippets           (dynamic)
//! GET       /snippet/view/{id}   - One snippet               (dynamic)
//! GET, POST /snippet/create      - Create form / submit      (dynamic + authenticated)
//! GET, POST /user/signup         - Signup form / submit      (dynamic + unauthenticated)
//! GET, POST /user/login          - Login form / submit       (dynamic + unauthenticated)
//! POST      /user/logout         - Log out                   (dynamic + authenticated)
//! GET       /ping                - Liveness, "OK"
//! GET       /static/*            - Static assets
//! ```
//!
//! Every request, matched or not, runs through the standard chain first.

pub mod forms;
pub mod home;
pub mod page;
pub mod snippets;
pub mod users;

use axum::{
    Router,
    routing::{get, get_service, post_service},
};
use tower_http::services::ServeDir;
use tower_sessions::SessionStore;

use crate::middleware::{
    Authenticate, CsrfProtect, LoadAndSave, LogRequest, RecoverPanic, RequireAuthentication,
    RequireUnauthentication, SecureHeaders,
};
use crate::pipeline::Chain;
use crate::state::AppState;

/// Stages applied to every request.
#[must_use]
pub fn standard_chain() -> Chain {
    Chain::new()
        .with(RecoverPanic::new().with_headers(SecureHeaders::header_map()))
        .with(LogRequest)
        .with(SecureHeaders)
}

/// Session, CSRF and authentication stages for page routes.
#[must_use]
pub fn dynamic_chain<S: SessionStore>(state: &AppState, store: S) -> Chain {
    Chain::new()
        .with(LoadAndSave::new(store, state.config().session_lifetime))
        .with(CsrfProtect::new())
        .with(Authenticate::new(state.users()))
}

/// Build the application router.
///
/// The returned router dispatches every request through the standard chain
/// to an inner router holding the route table.
pub fn app<S: SessionStore>(state: AppState, store: S) -> Router {
    Router::new().fallback_service(standard_chain().then_service(route_table(state, store)))
}

fn route_table<S: SessionStore>(state: AppState, store: S) -> Router {
    let dynamic = dynamic_chain(&state, store);
    let protected = dynamic.append(RequireAuthentication);
    let guest = dynamic.append(RequireUnauthentication);
    let static_dir = state.config().static_dir.clone();

    Router::new()
        .route("/", get_service(dynamic.then(home::home, state.clone())))
        .route(
            "/snippet/view/{id}",
            get_service(dynamic.then(snippets::view, state.clone())),
        )
        .route(
            "/snippet/create",
            get_service(protected.then(snippets::create_page, state.clone()))
                .post_service(protected.then(snippets::create, state.clone())),
        )
        .route(
            "/user/signup",
            get_service(guest.then(users::signup_page, state.clone()))
                .post_service(guest.then(users::signup, state.clone())),
        )
        .route(
            "/user/login",
            get_service(guest.then(users::login_page, state.clone()))
                .post_service(guest.then(users::login, state.clone())),
        )
        .route(
            "/user/logout",
            post_service(protected.then(users::logout, state)),
        )
        .route("/ping", get(home::ping))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(home::not_found)
}
