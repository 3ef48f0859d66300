//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CARTSYNC_API_URL` - Base URL of the remote store service (e.g. `http://localhost:8082/v1`)
//!
//! ## Optional
//! - `CARTSYNC_DATA_DIR` - Where session and preference files live (default: `<data dir>/cartsync`)
//! - `CARTSYNC_MAX_LINE_QUANTITY` - Largest quantity a single cart line may hold (default: 10)
//! - `CARTSYNC_SEARCH_DEBOUNCE_MS` - Search keystroke quiescence window (default: 300)
//! - `CARTSYNC_CATALOG_TTL_SECS` - Product list cache lifetime, 0 disables (default: 300)
//! - `CARTSYNC_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: none)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_MAX_LINE_QUANTITY: u32 = 10;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
const DEFAULT_CATALOG_TTL_SECS: u64 = 300;
const DATA_DIR_NAME: &str = "cartsync";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Service base URL, always ending in `/`
    pub api_url: Url,
    /// Directory holding `session.json` and `preferences.json`
    pub data_dir: PathBuf,
    /// Upper bound for a single cart line's quantity
    pub max_line_quantity: u32,
    /// Quiescence window before a keystroke filters the catalog
    pub search_debounce: Duration,
    /// Product list cache lifetime; zero disables the cache
    pub catalog_ttl: Duration,
    /// Per-request timeout
    pub request_timeout: Option<Duration>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl StorefrontConfig {
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let api_url = parse_base_url("CARTSYNC_API_URL", &env.required("CARTSYNC_API_URL")?)?;
        let data_dir = match env.optional("CARTSYNC_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let max_line_quantity =
            env.parsed_or("CARTSYNC_MAX_LINE_QUANTITY", DEFAULT_MAX_LINE_QUANTITY)?;
        if max_line_quantity == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CARTSYNC_MAX_LINE_QUANTITY".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let search_debounce = Duration::from_millis(
            env.parsed_or("CARTSYNC_SEARCH_DEBOUNCE_MS", DEFAULT_SEARCH_DEBOUNCE_MS)?,
        );
        let catalog_ttl = Duration::from_secs(
            env.parsed_or("CARTSYNC_CATALOG_TTL_SECS", DEFAULT_CATALOG_TTL_SECS)?,
        );
        let request_timeout = env
            .parsed::<u64>("CARTSYNC_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs);
        let sentry_dsn = env.optional("SENTRY_DSN");

        Ok(Self {
            api_url,
            data_dir,
            max_line_quantity,
            search_debounce,
            catalog_ttl,
            request_timeout,
            sentry_dsn,
        })
    }

    /// Defaults for everything except the service URL and data directory.
    #[must_use]
    pub fn new(api_url: Url, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_url: with_trailing_slash(api_url),
            data_dir: data_dir.into(),
            max_line_quantity: DEFAULT_MAX_LINE_QUANTITY,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            catalog_ttl: Duration::from_secs(DEFAULT_CATALOG_TTL_SECS),
            request_timeout: None,
            sentry_dsn: None,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable. Blank counts as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Parse an optional variable.
    fn parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            })
            .transpose()
    }

    /// Parse a variable with a default value.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parsed(key)?.unwrap_or(default))
    }
}

fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(with_trailing_slash(url))
}

/// Relative joins only append to a path that ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .ok_or_else(|| ConfigError::MissingEnvVar("CARTSYNC_DATA_DIR".to_string()))
}
