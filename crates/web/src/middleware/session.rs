//! Session load/save stage.
//!
//! Sessions are `tower-sessions` records kept in an injected
//! [`SessionStore`] (`PostgresStore` in production, `MemoryStore` in tests).
//! The stage reads the session cookie on the way in and, on the way out,
//! persists any mutation and refreshes or clears the cookie.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE, VARY},
    },
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::task::JoinHandle;
use tower_sessions::{
    Expiry, Session, SessionStore,
    cookie::{Cookie, SameSite, time},
    session::{Error as SessionError, Id},
    session_store::ExpiredDeletion,
};

use snippetbox_core::UserId;

use crate::error::AppError;
use crate::models::session::{AUTHENTICATED_USER_ID, FLASH};
use crate::pipeline::{Next, RequestContext, Stage};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Purge expired records from `store` every `period` until the task is
/// aborted.
pub fn spawn_expired_deletion<S>(store: S, period: Duration) -> JoinHandle<()>
where
    S: ExpiredDeletion,
{
    tokio::spawn(async move {
        if let Err(e) = store.continuously_delete_expired(period).await {
            tracing::error!(error = %e, "Expired session cleanup stopped");
        }
    })
}

/// The visitor's session as exposed to later stages and handlers.
#[derive(Debug, Clone)]
pub struct SessionHandle(Session);

impl SessionHandle {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self(session)
    }

    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the value does not deserialize.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        self.0.get(key).await
    }

    /// Write a value, marking the session modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the value does not serialize.
    pub async fn put<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: T,
    ) -> Result<(), SessionError> {
        self.0.insert(key, value).await
    }

    /// Read a value and remove it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the value does not deserialize.
    pub async fn pop<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        self.0.remove(key).await
    }

    /// Remove a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.0.remove_value(key).await.map(|_| ())
    }

    /// Issue a new token for the same data.
    ///
    /// The old token stops resolving once the session is saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn renew(&self) -> Result<(), SessionError> {
        self.0.cycle_id().await
    }

    /// Current token, if the session has been persisted.
    #[must_use]
    pub fn token(&self) -> Option<Id> {
        self.0.id()
    }

    /// The logged-in user, or an unset id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn user_id(&self) -> Result<UserId, SessionError> {
        Ok(self
            .get::<UserId>(AUTHENTICATED_USER_ID)
            .await?
            .unwrap_or_default())
    }

    /// Take the pending flash message.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn pop_flash(&self) -> Result<Option<String>, SessionError> {
        self.pop::<String>(FLASH).await
    }

    /// Queue a flash message for the next rendered page.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn put_flash(&self, message: &str) -> Result<(), SessionError> {
        self.put(FLASH, message).await
    }
}

/// Loads the session named by the request cookie and saves it afterwards.
///
/// On exit, a modified session is saved and its cookie refreshed; a session
/// left empty by the request is deleted and its cookie cleared. A failed save
/// replaces the response with a 500.
#[derive(Debug)]
pub struct LoadAndSave<S> {
    store: Arc<S>,
    cookie_name: String,
    lifetime: Duration,
}

impl<S: SessionStore> LoadAndSave<S> {
    #[must_use]
    pub fn new(store: S, lifetime: Duration) -> Self {
        Self {
            store: Arc::new(store),
            cookie_name: SESSION_COOKIE_NAME.to_owned(),
            lifetime,
        }
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    fn max_age(&self) -> time::Duration {
        time::Duration::try_from(self.lifetime).unwrap_or(time::Duration::MAX)
    }

    fn session_cookie(&self, id: Id) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), id.to_string()))
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(self.max_age())
            .build()
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.cookie_name.clone(), ""))
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Lax)
            .path("/")
            .build();
        cookie.make_removal();
        cookie
    }
}

#[async_trait]
impl<S: SessionStore> Stage for LoadAndSave<S> {
    async fn call(&self, request: Request, ctx: RequestContext, next: Next) -> Response {
        let session_id = session_id_from(request.headers(), &self.cookie_name);
        let had_cookie = session_id.is_some();
        let session = Session::new(
            session_id,
            Arc::clone(&self.store),
            Some(Expiry::OnInactivity(self.max_age())),
        );

        let mut response = next
            .run(request, ctx.with_session(SessionHandle::new(session.clone())))
            .await;

        if !session.is_modified() {
            return response;
        }

        if session.is_empty().await {
            if let Err(e) = session.delete().await {
                return AppError::Session(e).into_response();
            }
            if had_cookie {
                set_cookie(response.headers_mut(), &self.removal_cookie());
            }
            return response;
        }

        if let Err(e) = session.save().await {
            return AppError::Session(e).into_response();
        }

        if let Some(id) = session.id() {
            set_cookie(response.headers_mut(), &self.session_cookie(id));
        }
        response
    }
}

fn session_id_from(headers: &HeaderMap, name: &str) -> Option<Id> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .and_then(|cookie| cookie.value().parse::<Id>().ok())
}

fn set_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
            headers.append(VARY, HeaderValue::from_static("Cookie"));
        }
        Err(e) => tracing::error!(error = %e, "session cookie is not a valid header value"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::http::StatusCode;
    use tower_sessions::MemoryStore;
    use tower_sessions::session::Record;
    use tower_sessions::session_store;

    use super::*;
    use crate::pipeline::{Chain, Pipeline, endpoint_fn};

    const HOUR: Duration = Duration::from_secs(3600);

    fn request(cookie: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn set_cookie_of(response: &Response) -> Option<Cookie<'static>> {
        response
            .headers()
            .get(SET_COOKIE)
            .map(|value| Cookie::parse(value.to_str().unwrap().to_owned()).unwrap())
    }

    fn pipeline_with<F, Fut>(store: &MemoryStore, body: F) -> Pipeline
    where
        F: Fn(SessionHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Chain::new()
            .with(LoadAndSave::new(store.clone(), HOUR))
            .then_endpoint(endpoint_fn(move |_request, ctx: RequestContext| {
                let work = body(ctx.session().cloned().unwrap());
                async move {
                    work.await;
                    StatusCode::OK.into_response()
                }
            }))
    }

    #[tokio::test]
    async fn test_first_write_sets_hardened_cookie() {
        let store = MemoryStore::default();
        let pipeline = pipeline_with(&store, |session| async move {
            session.put("greeting", "hello").await.unwrap();
        });

        let response = pipeline.handle(request(None)).await;
        let cookie = set_cookie_of(&response).unwrap();

        assert_eq!(cookie.name(), SESSION_COOKIE_NAME);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(1)));
    }

    #[tokio::test]
    async fn test_cookie_resolves_saved_data() {
        let store = MemoryStore::default();
        let writer = pipeline_with(&store, |session| async move {
            session.put("count", 41_i32).await.unwrap();
        });
        let cookie = set_cookie_of(&writer.handle(request(None)).await).unwrap();

        let reader = pipeline_with(&store, |session| async move {
            assert_eq!(session.get::<i32>("count").await.unwrap(), Some(41));
        });
        let response = reader
            .handle(request(Some(&format!("session={}", cookie.value()))))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie_of(&response).is_none());
    }

    #[tokio::test]
    async fn test_untouched_session_sets_no_cookie() {
        let store = MemoryStore::default();
        let pipeline = pipeline_with(&store, |_session| async {});

        let response = pipeline.handle(request(None)).await;

        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_unknown_or_garbage_cookie_starts_empty_session() {
        let store = MemoryStore::default();
        let pipeline = pipeline_with(&store, |session| async move {
            assert_eq!(session.get::<String>("anything").await.unwrap(), None);
        });

        let garbage = pipeline.handle(request(Some("session=not-a-token"))).await;
        let unknown = pipeline
            .handle(request(Some(&format!("session={}", Id::default()))))
            .await;

        assert_eq!(garbage.status(), StatusCode::OK);
        assert_eq!(unknown.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_emptied_session_is_deleted_and_cookie_cleared() {
        let store = MemoryStore::default();
        let writer = pipeline_with(&store, |session| async move {
            session.put("only", true).await.unwrap();
        });
        let cookie = set_cookie_of(&writer.handle(request(None)).await).unwrap();
        let id: Id = cookie.value().parse().unwrap();

        let clearer = pipeline_with(&store, |session| async move {
            session.remove("only").await.unwrap();
        });
        let response = clearer
            .handle(request(Some(&format!("session={}", cookie.value()))))
            .await;

        let removal = set_cookie_of(&response).unwrap();
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(time::Duration::ZERO));
        assert!(store.load(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_renew_rotates_token_and_keeps_data() {
        let store = MemoryStore::default();
        let writer = pipeline_with(&store, |session| async move {
            session.put("kept", "value").await.unwrap();
        });
        let first = set_cookie_of(&writer.handle(request(None)).await).unwrap();

        let renewer = pipeline_with(&store, |session| async move {
            session.renew().await.unwrap();
        });
        let second = set_cookie_of(
            &renewer
                .handle(request(Some(&format!("session={}", first.value()))))
                .await,
        )
        .unwrap();

        assert_ne!(first.value(), second.value());
        let old: Id = first.value().parse().unwrap();
        let new: Id = second.value().parse().unwrap();
        assert!(store.load(&old).await.unwrap().is_none());
        let record = store.load(&new).await.unwrap().unwrap();
        assert_eq!(record.data["kept"], "value");
    }

    #[test]
    fn test_session_id_parsing_picks_named_cookie() {
        let id = Id::default();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; session={id}")).unwrap(),
        );

        assert_eq!(session_id_from(&headers, "session"), Some(id));
        assert_eq!(session_id_from(&headers, "other"), None);
    }

    #[derive(Debug, Clone, Default)]
    struct CountingStore {
        inner: MemoryStore,
        purges: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionStore for CountingStore {
        async fn save(&self, record: &Record) -> session_store::Result<()> {
            self.inner.save(record).await
        }

        async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
            self.inner.load(id).await
        }

        async fn delete(&self, id: &Id) -> session_store::Result<()> {
            self.inner.delete(id).await
        }
    }

    #[async_trait]
    impl ExpiredDeletion for CountingStore {
        async fn delete_expired(&self) -> session_store::Result<()> {
            self.purges.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_expired_deletion_runs_until_aborted() {
        let store = CountingStore::default();
        let purges = Arc::clone(&store.purges);

        let task = spawn_expired_deletion(store, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();
        let _ = task.await;

        let seen = purges.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected repeated purges, saw {seen}");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(purges.load(Ordering::SeqCst), seen);
    }
}
