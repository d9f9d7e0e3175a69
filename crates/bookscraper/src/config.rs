//! Configuration management
//!
//! All settings come from the environment (optionally via a `.env` file) and
//! are passed explicitly into the components that need them.

use bookscraper_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Header Provider Constants
// ============================================================================

/// Default endpoint of the fake browser header service.
pub const DEFAULT_HEADER_ENDPOINT: &str = "https://headers.scrapeops.io/v1/browser-headers";

/// Default timeout for the header provider call in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Database Constants
// ============================================================================

pub const DEFAULT_DB_HOST: &str = "127.0.0.1";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_USER: &str = "root";
pub const DEFAULT_DB_DATABASE: &str = "books";
pub const DEFAULT_DB_TABLE: &str = "books";

/// Default timeout for connect and per-record writes in seconds.
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 10;

/// Scraper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub headers: HeaderPoolConfig,
    pub sink: SinkConfig,
}

/// Browser header rotation settings
#[derive(Clone, Serialize, Deserialize)]
pub struct HeaderPoolConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub endpoint: String,
    /// Hint for how many templates the provider should return
    pub num_results: Option<u32>,
    /// Provider switch; rotation stays off unless this is explicitly true
    pub provider_enabled: bool,
    /// Feature switch for header rotation as a whole
    pub rotation_enabled: bool,
    pub timeout_secs: u64,
}

/// Relational sink connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub database: String,
    pub table: String,
    pub timeout_secs: u64,
}

impl ScraperConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            headers: HeaderPoolConfig::from_env(),
            sink: SinkConfig::from_env(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.headers.validate()?;
        self.sink.validate()
    }
}

impl HeaderPoolConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("SCRAPEOPS_API_KEY").unwrap_or_default(),
            endpoint: std::env::var("SCRAPEOPS_FAKE_BROWSER_HEADER_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_HEADER_ENDPOINT.to_string()),
            num_results: env_parse("SCRAPEOPS_NUM_RESULTS"),
            provider_enabled: env_flag("SCRAPEOPS_FAKE_BROWSER_HEADER_ENABLED").unwrap_or(false),
            rotation_enabled: env_flag("HEADER_ROTATION_ENABLED").unwrap_or(true),
            timeout_secs: env_parse("SCRAPEOPS_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::config("Header provider timeout must be greater than 0"));
        }

        if self.num_results == Some(0) {
            return Err(Error::config("SCRAPEOPS_NUM_RESULTS must be greater than 0"));
        }

        if self.rotation_enabled && self.provider_enabled {
            let endpoint = url::Url::parse(&self.endpoint).map_err(|e| {
                Error::config(format!("Invalid header endpoint '{}': {}", self.endpoint, e))
            })?;
            if !matches!(endpoint.scheme(), "http" | "https") {
                return Err(Error::config(format!(
                    "Header endpoint must be http(s), got '{}'",
                    self.endpoint
                )));
            }
            if self.api_key.trim().is_empty() {
                tracing::warn!("Header provider enabled without an API key - rotation is disabled");
            }
        }

        Ok(())
    }
}

impl Default for HeaderPoolConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_HEADER_ENDPOINT.to_string(),
            num_results: None,
            provider_enabled: false,
            rotation_enabled: true,
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for HeaderPoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderPoolConfig")
            .field("api_key", &redact(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("num_results", &self.num_results)
            .field("provider_enabled", &self.provider_enabled)
            .field("rotation_enabled", &self.rotation_enabled)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SinkConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("DB_MYSQL_HOST").unwrap_or_else(|_| DEFAULT_DB_HOST.to_string()),
            port: env_parse("DB_MYSQL_PORT").unwrap_or(DEFAULT_DB_PORT),
            user: std::env::var("DB_MYSQL_USER").unwrap_or_else(|_| DEFAULT_DB_USER.to_string()),
            password: std::env::var("DB_MYSQL_PASSWORD").unwrap_or_default(),
            database: std::env::var("DB_MYSQL_DATABASE")
                .unwrap_or_else(|_| DEFAULT_DB_DATABASE.to_string()),
            table: std::env::var("DB_MYSQL_TABLE")
                .unwrap_or_else(|_| DEFAULT_DB_TABLE.to_string()),
            timeout_secs: env_parse("DB_TIMEOUT_SECS").unwrap_or(DEFAULT_DB_TIMEOUT_SECS),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("Database host cannot be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("Database port must be greater than 0"));
        }
        if self.user.trim().is_empty() {
            return Err(Error::config("Database user cannot be empty"));
        }
        if self.database.trim().is_empty() {
            return Err(Error::config("Database name cannot be empty"));
        }
        if !is_sql_identifier(&self.table) {
            return Err(Error::config(format!(
                "Table name '{}' must be letters, digits and underscores",
                self.table
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("Database timeout must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            database: DEFAULT_DB_DATABASE.to_string(),
            table: DEFAULT_DB_TABLE.to_string(),
            timeout_secs: DEFAULT_DB_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("database", &self.database)
            .field("table", &self.table)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// A table name safe to splice into DDL: ASCII letters, digits and
/// underscores, not starting with a digit, at most 64 characters.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {},
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|s| {
        matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
    })
}
