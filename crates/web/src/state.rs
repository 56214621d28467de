//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::WebConfig;
use crate::db::{SnippetRepository, SnippetStore};
use crate::services::auth::{AuthService, UserDirectory};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The user directory and the
/// snippet store are trait objects so tests can substitute in-memory
/// implementations.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: WebConfig,
    users: Arc<dyn UserDirectory>,
    snippets: Arc<dyn SnippetStore>,
}

impl AppState {
    /// Create a new application state from explicit collaborators.
    #[must_use]
    pub fn new(
        config: WebConfig,
        users: Arc<dyn UserDirectory>,
        snippets: Arc<dyn SnippetStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                users,
                snippets,
            }),
        }
    }

    /// Create the production state backed by `PostgreSQL`.
    #[must_use]
    pub fn with_pool(config: WebConfig, pool: PgPool) -> Self {
        Self::new(
            config,
            Arc::new(AuthService::new(pool.clone())),
            Arc::new(SnippetRepository::new(pool)),
        )
    }

    /// Get a reference to the web configuration.
    #[must_use]
    pub fn config(&self) -> &WebConfig {
        &self.inner.config
    }

    /// Get the user directory.
    #[must_use]
    pub fn users(&self) -> Arc<dyn UserDirectory> {
        Arc::clone(&self.inner.users)
    }

    /// Get the snippet store.
    #[must_use]
    pub fn snippets(&self) -> &dyn SnippetStore {
        self.inner.snippets.as_ref()
    }
}
