//! Web configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SNIPPETBOX_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `SNIPPETBOX_HOST` - Bind address (default: 127.0.0.1)
//! - `SNIPPETBOX_PORT` - Listen port (default: 4000)
//! - `SNIPPETBOX_STATIC_DIR` - Directory served under `/static` (default: crates/web/static)
//! - `SNIPPETBOX_SESSION_LIFETIME_HOURS` - Idle session lifetime (default: 12)
//! - `SNIPPETBOX_TLS_CERT` / `SNIPPETBOX_TLS_KEY` - PEM certificate chain and key (set both or neither)
//! - `SNIPPETBOX_LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate, 0.0 to 1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate, 0.0 to 1.0 (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_SESSION_LIFETIME_HOURS: u64 = 12;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Web application configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Directory of static assets served under `/static`
    pub static_dir: PathBuf,
    /// How long an idle session stays valid
    pub session_lifetime: Duration,
    /// TLS material; plain HTTP when absent
    pub tls: Option<TlsConfig>,
    pub log_format: LogFormat,
    /// Sentry settings
    pub sentry: SentryConfig,
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

/// TLS certificate and private key in PEM form.
///
/// Implements `Debug` manually to redact the key.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("SNIPPETBOX_TLS_CERT");
        let key_pem = get_optional_env("SNIPPETBOX_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "SNIPPETBOX_TLS_*".to_string(),
                "Both SNIPPETBOX_TLS_CERT and SNIPPETBOX_TLS_KEY must be set together"
                    .to_string(),
            )),
        }
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            traces_sample_rate: parse_rate("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }
}

impl WebConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SNIPPETBOX_DATABASE_URL")?;
        let host = get_env_or_default("SNIPPETBOX_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SNIPPETBOX_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("SNIPPETBOX_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SNIPPETBOX_PORT".to_string(), e.to_string())
            })?;
        let static_dir = PathBuf::from(get_env_or_default(
            "SNIPPETBOX_STATIC_DIR",
            "crates/web/static",
        ));
        let session_lifetime = parse_session_lifetime(
            get_optional_env("SNIPPETBOX_SESSION_LIFETIME_HOURS").as_deref(),
        )?;
        let log_format = parse_log_format(&get_env_or_default("SNIPPETBOX_LOG_FORMAT", "text"))?;

        Ok(Self {
            database_url,
            host,
            port,
            static_dir,
            session_lifetime,
            tls: TlsConfig::from_env()?,
            log_format,
            sentry: SentryConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_session_lifetime(raw: Option<&str>) -> Result<Duration, ConfigError> {
    let hours = match raw {
        None => DEFAULT_SESSION_LIFETIME_HOURS,
        Some(value) => value
            .parse::<u64>()
            .ok()
            .filter(|hours| *hours > 0)
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "SNIPPETBOX_SESSION_LIFETIME_HOURS".to_string(),
                    format!("expected a positive number of hours, got '{value}'"),
                )
            })?,
    };
    Ok(Duration::from_secs(hours * 60 * 60))
}

fn parse_log_format(raw: &str) -> Result<LogFormat, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(ConfigError::InvalidEnvVar(
            "SNIPPETBOX_LOG_FORMAT".to_string(),
            format!("expected 'text' or 'json', got '{other}'"),
        )),
    }
}

fn parse_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    raw.parse::<f32>()
        .ok()
        .filter(|rate| (0.0..=1.0).contains(rate))
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(key.to_string(), "must be between 0.0 and 1.0".to_string())
        })
}
