//! Outermost panic boundary.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode, header::CONNECTION},
    response::Response,
};
use futures::FutureExt;

use crate::error::status_text;
use crate::pipeline::{Next, RequestContext, Stage};

/// Log target of the recovered-panic event.
///
/// The Sentry panic integration already reports the panic itself, so the
/// tracing layer records events with this target as breadcrumbs.
pub const PANIC_LOG_TARGET: &str = "snippetbox_web::panic";

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

/// Chain a panic hook that records the backtrace of the panicking thread
/// before the stack unwinds. Previously installed hooks still run.
fn install_backtrace_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture();
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            previous(info);
        }));
    });
}

/// Backtrace recorded by the most recent panic on this thread.
fn take_panic_backtrace() -> Option<Backtrace> {
    PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// Converts a panic anywhere downstream into a generic 500.
///
/// The synthesized response carries `Connection: close` plus any baseline
/// headers configured with [`RecoverPanic::with_headers`], since the stages
/// that would normally decorate the response were unwound.
///
/// Constructing the stage installs a process-wide panic hook that keeps the
/// backtrace taken at the panic site for the log line.
#[derive(Debug, Clone, Default)]
pub struct RecoverPanic {
    baseline: HeaderMap,
}

impl RecoverPanic {
    #[must_use]
    pub fn new() -> Self {
        install_backtrace_hook();
        Self::default()
    }

    /// Headers to set on every synthesized 500.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.baseline = headers;
        self
    }
}

#[async_trait]
impl Stage for RecoverPanic {
    async fn call(&self, request: Request, ctx: RequestContext, next: Next) -> Response {
        let method = request.method().clone();
        let uri = request.uri().clone();

        match AssertUnwindSafe(next.run(request, ctx)).catch_unwind().await {
            Ok(response) => response,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let backtrace = take_panic_backtrace().map_or_else(
                    || "backtrace unavailable".to_owned(),
                    |backtrace| backtrace.to_string(),
                );
                tracing::error!(
                    target: PANIC_LOG_TARGET,
                    %method,
                    %uri,
                    panic = %message,
                    %backtrace,
                    "recovered from panic"
                );

                let mut response = status_text(StatusCode::INTERNAL_SERVER_ERROR);
                let headers = response.headers_mut();
                for (name, value) in &self.baseline {
                    headers.insert(name.clone(), value.clone());
                }
                headers.insert(CONNECTION, HeaderValue::from_static("close"));
                response
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
