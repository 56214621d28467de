//! Integration tests for Snippetbox.
//!
//! The fully assembled router is driven in-process with
//! `tower::ServiceExt::oneshot`. Sessions live in a `MemoryStore`; users and
//! snippets live in the in-memory directories below, so no database is
//! needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p snippetbox-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::Utc;
use http_body_util::BodyExt;
use regex::Regex;
use secrecy::SecretString;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use snippetbox_core::{Email, SnippetId, SnippetLifetime, UserId};
use snippetbox_web::config::{LogFormat, SentryConfig, WebConfig};
use snippetbox_web::db::{RepositoryError, SnippetStore};
use snippetbox_web::models::Snippet;
use snippetbox_web::routes;
use snippetbox_web::services::auth::{AuthError, UserDirectory, validate_password};
use snippetbox_web::state::AppState;

/// Password of the account created by [`TestApp::with_user`].
pub const PASSWORD: &str = "pa55word";

/// Email of the account created by [`TestApp::with_user`].
pub const EMAIL: &str = "alice@example.com";

/// Configuration pointing at the real static directory.
#[must_use]
pub fn test_config() -> WebConfig {
    WebConfig {
        database_url: SecretString::from("postgres://unused"),
        host: "127.0.0.1".parse().unwrap(),
        port: 4000,
        static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../web/static"),
        session_lifetime: Duration::from_secs(12 * 60 * 60),
        tls: None,
        log_format: LogFormat::Text,
        sentry: SentryConfig::default(),
    }
}

// =============================================================================
// In-memory collaborators
// =============================================================================

struct StoredUser {
    id: UserId,
    email: Email,
    password: String,
}

/// User directory kept in memory. Passwords are compared in plain text.
#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<Vec<StoredUser>>,
}

impl InMemoryUsers {
    /// Delete a user, leaving any session that references it stale.
    pub fn remove(&self, id: UserId) {
        self.users.lock().unwrap().retain(|user| user.id != id);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUsers {
    async fn exists(&self, id: UserId) -> Result<bool, RepositoryError> {
        Ok(self.users.lock().unwrap().iter().any(|user| user.id == id))
    }

    async fn insert(
        &self,
        _name: &str,
        email: &Email,
        password: &str,
    ) -> Result<UserId, AuthError> {
        validate_password(password)?;
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|user| user.email == *email) {
            return Err(AuthError::DuplicateEmail);
        }
        let id = UserId::new(i32::try_from(users.len()).unwrap() + 1);
        users.push(StoredUser {
            id,
            email: email.clone(),
            password: password.to_owned(),
        });
        Ok(id)
    }

    async fn authenticate(&self, email: &Email, password: &str) -> Result<UserId, AuthError> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.email == *email && user.password == password)
            .map(|user| user.id)
            .ok_or(AuthError::InvalidCredentials)
    }
}

/// Snippet store kept in memory.
#[derive(Default)]
pub struct InMemorySnippets {
    snippets: Mutex<Vec<Snippet>>,
}

#[async_trait]
impl SnippetStore for InMemorySnippets {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires: SnippetLifetime,
    ) -> Result<SnippetId, RepositoryError> {
        let mut snippets = self.snippets.lock().unwrap();
        let id = SnippetId::new(i32::try_from(snippets.len()).unwrap() + 1);
        let created = Utc::now();
        snippets.push(Snippet {
            id,
            title: title.to_owned(),
            content: content.to_owned(),
            created,
            expires: created + chrono::Duration::days(i64::from(expires.days())),
        });
        Ok(id)
    }

    async fn get(&self, id: SnippetId) -> Result<Snippet, RepositoryError> {
        let now = Utc::now();
        self.snippets
            .lock()
            .unwrap()
            .iter()
            .find(|snippet| snippet.id == id && snippet.expires > now)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn latest(&self) -> Result<Vec<Snippet>, RepositoryError> {
        let now = Utc::now();
        Ok(self
            .snippets
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|snippet| snippet.expires > now)
            .take(10)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Test application and client
// =============================================================================

/// The assembled application with handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub users: Arc<InMemoryUsers>,
    pub snippets: Arc<InMemorySnippets>,
    pub sessions: MemoryStore,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let users = Arc::new(InMemoryUsers::default());
        let snippets = Arc::new(InMemorySnippets::default());
        let sessions = MemoryStore::default();
        let state = AppState::new(
            test_config(),
            Arc::clone(&users) as Arc<dyn UserDirectory>,
            Arc::clone(&snippets) as Arc<dyn SnippetStore>,
        );
        let router = routes::app(state, sessions.clone());
        Self {
            router,
            users,
            snippets,
            sessions,
        }
    }

    /// An application with one registered user.
    pub async fn with_user() -> (Self, UserId) {
        let app = Self::new();
        let id = app
            .users
            .insert("Alice", &Email::parse(EMAIL).unwrap(), PASSWORD)
            .await
            .unwrap();
        (app, id)
    }

    /// A client with an empty cookie jar.
    #[must_use]
    pub fn client(&self) -> Client {
        Client {
            router: self.router.clone(),
            cookie: None,
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A collected response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Value of a header as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Target of a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header(header::LOCATION.as_str())
    }

    /// The masked CSRF token embedded in the page, if any.
    #[must_use]
    pub fn csrf_token(&self) -> Option<String> {
        let pattern = Regex::new(r#"name="csrf_token" value="([A-Za-z0-9_-]+)""#).unwrap();
        pattern
            .captures(&self.body)
            .and_then(|captures| captures.get(1))
            .map(|token| token.as_str().to_owned())
    }
}

/// A browser-like client holding the session cookie between requests.
pub struct Client {
    router: Router,
    cookie: Option<String>,
}

impl Client {
    /// The `name=value` pair of the current session cookie.
    #[must_use]
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        let request = self.request(Method::GET, path).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// POST a urlencoded form made of `fields`.
    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = self
            .request(Method::POST, path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Fetch `form_path` for a token, then POST `fields` plus that token.
    pub async fn submit(
        &mut self,
        form_path: &str,
        action: &str,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let page = self.get(form_path).await;
        let token = page.csrf_token().unwrap();
        let mut fields: Vec<(&str, &str)> = fields.to_vec();
        fields.push(("csrf_token", token.as_str()));
        self.post_form(action, &fields).await
    }

    /// Log in as the account created by [`TestApp::with_user`].
    pub async fn login(&mut self) -> TestResponse {
        self.submit(
            "/user/login",
            "/user/login",
            &[("email", EMAIL), ("password", PASSWORD)],
        )
        .await
    }

    pub fn request(&self, method: Method, path: &str) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(path);
        match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    /// Send a request and update the cookie jar from `Set-Cookie`.
    pub async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();

        if let Some(set_cookie) = parts
            .headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
        {
            let pair = set_cookie.split(';').next().unwrap_or_default().to_owned();
            if set_cookie.contains("Max-Age=0") {
                self.cookie = None;
            } else {
                self.cookie = Some(pair);
            }
        }

        TestResponse {
            status: parts.status,
            headers: parts.headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }
}
