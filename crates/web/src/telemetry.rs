//! Tracing subscriber and Sentry setup.

use sentry::integrations::tracing as sentry_tracing;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, SentryConfig};
use crate::middleware::recover::PANIC_LOG_TARGET;

const DEFAULT_FILTER: &str = "snippetbox_web=info,tower_http=debug";

/// Initialize Sentry error tracking and return guard that must be kept alive.
///
/// Returns `None` when no DSN is configured.
#[must_use]
pub fn init_sentry(config: &SentryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config.environment.clone().map(std::borrow::Cow::Owned),
            sample_rate: config.sample_rate,
            traces_sample_rate: config.traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Install the global tracing subscriber.
///
/// Defaults to info level for this crate if `RUST_LOG` is not set. Lines go
/// to stdout through a non-blocking writer that drops lines when its buffer
/// is full. The returned guard flushes the writer on drop and must outlive
/// the server.
#[must_use]
pub fn init_tracing(format: LogFormat) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json_layer = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(writer.clone())
    });
    let text_layer = (format == LogFormat::Text)
        .then(|| tracing_subscriber::fmt::layer().with_writer(writer.clone()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    guard
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    if metadata.target() == PANIC_LOG_TARGET {
        return sentry_tracing::EventFilter::Breadcrumb;
    }
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};

    use super::*;

    /// Records how each event would be forwarded to Sentry.
    struct ForwardedAs(Arc<Mutex<Vec<sentry_tracing::EventFilter>>>);

    impl<S: Subscriber> Layer<S> for ForwardedAs {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0
                .lock()
                .unwrap()
                .push(sentry_event_filter(event.metadata()));
        }
    }

    #[test]
    fn test_recovered_panic_log_is_breadcrumb_not_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(ForwardedAs(Arc::clone(&seen)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: PANIC_LOG_TARGET, "recovered from panic");
            tracing::error!("database unavailable");
            tracing::info!("request");
        });

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                sentry_tracing::EventFilter::Breadcrumb,
                sentry_tracing::EventFilter::Event,
                sentry_tracing::EventFilter::Breadcrumb,
            ]
        );
    }

    #[test]
    fn test_init_sentry_without_dsn_is_noop() {
        assert!(init_sentry(&SentryConfig::default()).is_none());
    }
}
