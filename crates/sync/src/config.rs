//! Sync service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WEBFLOW_SITE_ID` - Webflow site whose orders are synced
//! - `WEBFLOW_API_TOKEN` - Webflow site API token (bearer)
//! - `GOOGLE_SHEET_ID` - Spreadsheet id of the tracking sheet
//! - `GOOGLE_ACCOUNT` - Service account client email
//! - `GOOGLE_SHEET_PRIVATE` - Service account PEM private key (`\n` escapes allowed)
//!
//! ## Optional
//! - `SYNC_HOST` - Bind address (default: 127.0.0.1)
//! - `SYNC_PORT` - Listen port (default: 3000)
//! - `WEBFLOW_API_BASE` - API base URL (default: <https://api.webflow.com/v2>)
//! - `WEBFLOW_API_VERSION` - `accept-version` header (default: 2.0.0)
//! - `WEBFLOW_VENUE_COLLECTION_ID` - CMS collection holding venues
//! - `WEBFLOW_LOCATION_COLLECTION_ID` - CMS collection holding locations
//! - `WEBFLOW_INVENTORY_COLLECTION_ID` - Collection whose items carry inventory
//! - `GOOGLE_SHEET_NAME` - Tab name (default: Sheet1)
//! - `SHEETS_API_BASE` - Sheets API base URL
//! - `GOOGLE_TOKEN_URI` - OAuth token endpoint
//! - `SYNC_PAGE_SIZE` - Orders per page (default: 1)
//! - `SYNC_PAGE_DELAY_SECS` - Pause between pages (default: 60)
//! - `SYNC_MAX_RETRIES` - Retries after HTTP 429 before giving up (default: 3)
//! - `SYNC_DEFAULT_RETRY_AFTER_SECS` - Wait when `retry-after` is missing (default: 60)
//! - `SYNC_MAX_RETRY_WAIT_SECS` - Upper bound on a single 429 wait (default: 300)
//! - `SYNC_CHECKPOINT_PATH` - Checkpoint file (default: progress.json)
//! - `SYNC_EXPORT_PATH` - Order export file (default: orders.json)
//! - `SHOW_DATE_TZ` - `local`, `utc` or a fixed offset like `+10:00` (default: local)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use ticket_ledger_core::{CollectionId, ShowDateZone, SiteId};

use crate::throttle::RetryPolicy;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

pub const DEFAULT_WEBFLOW_API_BASE: &str = "https://api.webflow.com/v2";
pub const DEFAULT_WEBFLOW_API_VERSION: &str = "2.0.0";
pub const DEFAULT_VENUE_COLLECTION_ID: &str = "63ef74b5f1e5b8057d54abfd";
pub const DEFAULT_LOCATION_COLLECTION_ID: &str = "63ef74b5f1e5b8ebbd54abfc";
pub const DEFAULT_INVENTORY_COLLECTION_ID: &str = "63ef74b5f1e5b8f06354abf9";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const DEFAULT_GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Sync service configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Webflow API configuration
    pub webflow: WebflowConfig,
    /// Google Sheets configuration
    pub sheets: SheetsConfig,
    /// Pagination, retry and persistence settings
    pub sync: SyncSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Non-fatal findings, to be logged once tracing is initialized
    pub warnings: Vec<String>,
}

/// Webflow Data API configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct WebflowConfig {
    /// API base URL, without trailing slash
    pub api_base: String,
    /// Value of the `accept-version` header
    pub api_version: String,
    /// Site whose orders and products are read
    pub site_id: SiteId,
    /// Site API token
    pub api_token: SecretString,
    /// CMS collections used during enrichment
    pub collections: CmsCollections,
}

impl std::fmt::Debug for WebflowConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebflowConfig")
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("site_id", &self.site_id)
            .field("api_token", &"[REDACTED]")
            .field("collections", &self.collections)
            .finish()
    }
}

/// CMS collection ids referenced by products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmsCollections {
    pub venue: CollectionId,
    pub location: CollectionId,
    pub inventory: CollectionId,
}

impl Default for CmsCollections {
    fn default() -> Self {
        Self {
            venue: CollectionId::new(DEFAULT_VENUE_COLLECTION_ID),
            location: CollectionId::new(DEFAULT_LOCATION_COLLECTION_ID),
            inventory: CollectionId::new(DEFAULT_INVENTORY_COLLECTION_ID),
        }
    }
}

/// Google Sheets configuration with service-account credentials.
///
/// Implements `Debug` manually to redact the private key.
#[derive(Clone)]
pub struct SheetsConfig {
    /// Spreadsheet id
    pub spreadsheet_id: String,
    /// Tab holding the tracking rows
    pub sheet_name: String,
    /// Sheets API base URL, without trailing slash
    pub api_base: String,
    /// OAuth token endpoint for the JWT bearer grant
    pub token_uri: String,
    /// Service account client email
    pub client_email: String,
    /// Service account PEM private key
    pub private_key: SecretString,
}

impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("sheet_name", &self.sheet_name)
            .field("api_base", &self.api_base)
            .field("token_uri", &self.token_uri)
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Run-loop settings.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Orders requested per page
    pub page_size: u32,
    /// Pause after each completed page
    pub page_delay: Duration,
    /// 429 handling for every outbound call
    pub retry: RetryPolicy,
    /// Checkpoint file
    pub checkpoint_path: PathBuf,
    /// Legacy order export file
    pub export_path: PathBuf,
    /// Zone used to format show dates
    pub show_date_zone: ShowDateZone,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 1,
            page_delay: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            checkpoint_path: PathBuf::from("progress.json"),
            export_path: PathBuf::from("orders.json"),
            show_date_zone: ShowDateZone::Local,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("SYNC_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SYNC_HOST".to_string(), e.to_string()))?;
        let port = parse_env_or_default("SYNC_PORT", 3000_u16)?;

        let webflow = WebflowConfig::from_env()?;
        let warnings = webflow.secret_warnings();
        let sheets = SheetsConfig::from_env()?;
        let sync = SyncSettings::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            host,
            port,
            webflow,
            sheets,
            sync,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            warnings,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl WebflowConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_token = get_required_env("WEBFLOW_API_TOKEN")?;
        reject_placeholder(&api_token, "WEBFLOW_API_TOKEN")?;

        Ok(Self {
            api_base: get_base_url("WEBFLOW_API_BASE", DEFAULT_WEBFLOW_API_BASE)?,
            api_version: get_env_or_default("WEBFLOW_API_VERSION", DEFAULT_WEBFLOW_API_VERSION),
            site_id: SiteId::new(get_required_env("WEBFLOW_SITE_ID")?),
            api_token: SecretString::from(api_token),
            collections: CmsCollections {
                venue: CollectionId::new(get_env_or_default(
                    "WEBFLOW_VENUE_COLLECTION_ID",
                    DEFAULT_VENUE_COLLECTION_ID,
                )),
                location: CollectionId::new(get_env_or_default(
                    "WEBFLOW_LOCATION_COLLECTION_ID",
                    DEFAULT_LOCATION_COLLECTION_ID,
                )),
                inventory: CollectionId::new(get_env_or_default(
                    "WEBFLOW_INVENTORY_COLLECTION_ID",
                    DEFAULT_INVENTORY_COLLECTION_ID,
                )),
            },
        })
    }

    /// Weak-token findings that do not block startup.
    fn secret_warnings(&self) -> Vec<String> {
        validate_entropy(self.api_token.expose_secret(), "WEBFLOW_API_TOKEN")
            .err()
            .map(|e| e.to_string())
            .into_iter()
            .collect()
    }
}

impl SheetsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let private_key = normalize_private_key(&get_required_env("GOOGLE_SHEET_PRIVATE")?);
        validate_private_key(&private_key, "GOOGLE_SHEET_PRIVATE")?;

        Ok(Self {
            spreadsheet_id: get_required_env("GOOGLE_SHEET_ID")?,
            sheet_name: get_env_or_default("GOOGLE_SHEET_NAME", "Sheet1"),
            api_base: get_base_url("SHEETS_API_BASE", DEFAULT_SHEETS_API_BASE)?,
            token_uri: get_base_url("GOOGLE_TOKEN_URI", DEFAULT_GOOGLE_TOKEN_URI)?,
            client_email: get_required_env("GOOGLE_ACCOUNT")?,
            private_key: SecretString::from(private_key),
        })
    }
}

impl SyncSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let page_size = parse_env_or_default("SYNC_PAGE_SIZE", defaults.page_size)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let retry = RetryPolicy {
            max_retries: parse_env_or_default("SYNC_MAX_RETRIES", defaults.retry.max_retries)?,
            default_retry_after: Duration::from_secs(parse_env_or_default(
                "SYNC_DEFAULT_RETRY_AFTER_SECS",
                defaults.retry.default_retry_after.as_secs(),
            )?),
            max_wait: Duration::from_secs(parse_env_or_default(
                "SYNC_MAX_RETRY_WAIT_SECS",
                defaults.retry.max_wait.as_secs(),
            )?),
        };

        let show_date_zone = get_optional_env("SHOW_DATE_TZ")
            .map(|raw| {
                raw.parse::<ShowDateZone>().map_err(|e| {
                    ConfigError::InvalidEnvVar("SHOW_DATE_TZ".to_string(), e.to_string())
                })
            })
            .transpose()?
            .unwrap_or(defaults.show_date_zone);

        Ok(Self {
            page_size,
            page_delay: Duration::from_secs(parse_env_or_default(
                "SYNC_PAGE_DELAY_SECS",
                defaults.page_delay.as_secs(),
            )?),
            retry,
            checkpoint_path: get_optional_env("SYNC_CHECKPOINT_PATH")
                .map_or(defaults.checkpoint_path, PathBuf::from),
            export_path: get_optional_env("SYNC_EXPORT_PATH")
                .map_or(defaults.export_path, PathBuf::from),
            show_date_zone,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Get a base URL, validating it and stripping any trailing slash.
fn get_base_url(key: &str, default: &str) -> Result<String, ConfigError> {
    let raw = get_env_or_default(key, default);
    url::Url::parse(&raw)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(raw.trim_end_matches('/').to_string())
}

/// Turn literal `\n` escapes (as stored in most secret managers) into newlines.
fn normalize_private_key(raw: &str) -> String {
    raw.trim().trim_matches('"').replace("\\n", "\n")
}

/// Check that a private key is PEM encoded.
fn validate_private_key(key: &str, var_name: &str) -> Result<(), ConfigError> {
    if key.contains("-----BEGIN") && key.contains("PRIVATE KEY-----") {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "expected a PEM encoded private key".to_string(),
        ))
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject secrets that still contain placeholder text.
fn reject_placeholder(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Check that a secret has the entropy of a generated token.
fn validate_entropy(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }
    Ok(())
}
