//! Configuration management
//!
//! Configuration is read from `config.yml` and may be overridden with
//! `TIMETRACK_*` environment variables. Missing values fall back to defaults,
//! so an absent or empty file yields a runnable configuration.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Login session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Time tracking behaviour
    #[serde(default)]
    pub tracking: TrackingConfig,
    /// Template overrides
    #[serde(default)]
    pub templates: TemplateConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL or SQLite file path
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Upper bound on pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/timetrack.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a login session stays valid
    #[serde(default = "default_lifetime_days")]
    pub lifetime_days: i64,
    /// Mark the session cookie `Secure` (only sent over HTTPS)
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_days: default_lifetime_days(),
            secure_cookie: false,
        }
    }
}

fn default_lifetime_days() -> i64 {
    14
}

/// Time tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// IANA time zone used for week/month boundaries, form input and display
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Store the clock-in form description instead of an empty one
    #[serde(default)]
    pub capture_clock_in_description: bool,
    /// Weekly hour limit seeded on first start
    #[serde(default = "default_weekly_hours")]
    pub default_weekly_hours: f64,
    /// Monthly hour limit seeded on first start
    #[serde(default = "default_monthly_hours")]
    pub default_monthly_hours: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            capture_clock_in_description: false,
            default_weekly_hours: default_weekly_hours(),
            default_monthly_hours: default_monthly_hours(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_weekly_hours() -> f64 {
    40.0
}

fn default_monthly_hours() -> f64 {
    160.0
}

impl TrackingConfig {
    /// Parse the configured time zone name
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::ValidationError(format!("unknown time zone '{}'", self.timezone)))
    }
}

/// Template configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory of `.html` files that replace embedded templates of the same name
    #[serde(default)]
    pub override_path: Option<PathBuf>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file.
    ///
    /// A missing or empty file yields the default configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })
    }

    /// Load configuration from file, apply `TIMETRACK_*` overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later at request time
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracking.tz()?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.session.lifetime_days <= 0 {
            return Err(ConfigError::ValidationError(
                "session.lifetime_days must be positive".to_string(),
            ));
        }
        if self.tracking.default_weekly_hours < 0.0 || self.tracking.default_monthly_hours < 0.0 {
            return Err(ConfigError::ValidationError(
                "default hour limits cannot be negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("TIMETRACK_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("TIMETRACK_SERVER_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Some(driver) = lookup("TIMETRACK_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                other => tracing::warn!("Ignoring unknown TIMETRACK_DATABASE_DRIVER '{}'", other),
            }
        }
        if let Some(url) = lookup("TIMETRACK_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max) = lookup("TIMETRACK_DATABASE_MAX_CONNECTIONS").and_then(|m| m.parse().ok()) {
            self.database.max_connections = max;
        }

        if let Some(days) = lookup("TIMETRACK_SESSION_LIFETIME_DAYS").and_then(|d| d.parse().ok()) {
            self.session.lifetime_days = days;
        }
        if let Some(secure) = lookup("TIMETRACK_SESSION_SECURE_COOKIE").and_then(|s| s.parse().ok()) {
            self.session.secure_cookie = secure;
        }

        if let Some(tz) = lookup("TIMETRACK_TRACKING_TIMEZONE") {
            self.tracking.timezone = tz;
        }
        if let Some(capture) =
            lookup("TIMETRACK_TRACKING_CAPTURE_CLOCK_IN_DESCRIPTION").and_then(|c| c.parse().ok())
        {
            self.tracking.capture_clock_in_description = capture;
        }

        if let Some(path) = lookup("TIMETRACK_TEMPLATES_OVERRIDE_PATH") {
            self.templates.override_path = Some(PathBuf::from(path));
        }
    }
}

/// Format YAML parsing error with location
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    match e.location() {
        Some(location) => format!("at line {}, column {}: {}", location.line(), location.column(), e),
        None => e.to_string(),
    }
}
