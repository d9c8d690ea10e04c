//! Server configuration loading from file and environment variables.
//!
//! A configuration profile (`development`, `testing`, `production`) supplies
//! the defaults for settings that differ between environments: the database
//! location, CSRF enforcement, and the `Secure` cookie flag. Anything set
//! explicitly in the file or the environment wins over the profile.

use chrono::TimeDelta;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use thiserror::Error;

/// Deployment profile, selected by `HUSKY_CONFIG` or `--profile`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Development,
    Testing,
    Production,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }

    fn default_db_path(self) -> &'static str {
        match self {
            Self::Development => "husky-dev.db",
            Self::Testing => husky_db::MEMORY_PATH,
            Self::Production => "husky.db",
        }
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "testing" | "test" => Ok(Self::Testing),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Active profile. Overridden by `HUSKY_CONFIG`.
    #[serde(default)]
    pub profile: Profile,

    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Blog presentation settings.
    #[serde(default)]
    pub blog: BlogConfig,

    /// Session and CSRF settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served under `/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

/// Database configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Defaults per profile.
    #[serde(default)]
    pub path: Option<String>,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,

    /// Maximum number of pooled connections.
    #[serde(default)]
    pub pool_max_size: Option<u32>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "husky_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Blog presentation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BlogConfig {
    /// Site title shown in the page header.
    #[serde(default = "default_title")]
    pub title: String,

    /// Posts per index page.
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,
}

/// Session lifetime and CSRF settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of an ordinary session, in hours.
    #[serde(default = "default_session_hours")]
    pub ttl_hours: i64,

    /// Lifetime of a "remember me" session, in days.
    #[serde(default = "default_remember_days")]
    pub remember_days: i64,

    /// Enforce CSRF tokens on unsafe requests. Off only in `testing` by default.
    #[serde(default)]
    pub csrf_enabled: Option<bool>,

    /// Mark the session cookie `Secure`. On only in `production` by default.
    #[serde(default)]
    pub secure_cookie: Option<bool>,
}

/// Longest accepted session lifetime, in days.
const MAX_SESSION_DAYS: i64 = 3650;

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_title() -> String {
    "Husky".to_string()
}

fn default_posts_per_page() -> u32 {
    10
}

fn default_session_hours() -> i64 {
    24
}

fn default_remember_days() -> i64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            posts_per_page: default_posts_per_page(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_session_hours(),
            remember_days: default_remember_days(),
            csrf_enabled: None,
            secure_cookie: None,
        }
    }
}

impl Config {
    /// Defaults for the given profile, as if no file were present.
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    /// Effective database path.
    pub fn database_path(&self) -> String {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| self.profile.default_db_path().to_string())
    }

    /// Effective pool settings.
    pub fn db_settings(&self) -> husky_db::DbRuntimeSettings {
        let defaults = husky_db::DbRuntimeSettings::default();
        husky_db::DbRuntimeSettings {
            busy_timeout_ms: self
                .database
                .busy_timeout_ms
                .unwrap_or(defaults.busy_timeout_ms),
            pool_max_size: self
                .database
                .pool_max_size
                .unwrap_or(defaults.pool_max_size),
        }
    }

    /// Whether unsafe requests must carry a CSRF token.
    pub fn csrf_enabled(&self) -> bool {
        self.session
            .csrf_enabled
            .unwrap_or(self.profile != Profile::Testing)
    }

    /// Lifetime of an ordinary session.
    pub fn session_ttl(&self) -> Result<TimeDelta, ConfigError> {
        session_lifetime(
            "session.ttl_hours",
            TimeDelta::try_hours(self.session.ttl_hours),
        )
    }

    /// Lifetime of a "remember me" session.
    pub fn remember_ttl(&self) -> Result<TimeDelta, ConfigError> {
        session_lifetime(
            "session.remember_days",
            TimeDelta::try_days(self.session.remember_days),
        )
    }

    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session_ttl()?;
        self.remember_ttl()?;
        Ok(())
    }

    /// Whether the session cookie carries the `Secure` attribute.
    pub fn secure_cookie(&self) -> bool {
        self.session
            .secure_cookie
            .unwrap_or(self.profile == Profile::Production)
    }
}

fn session_lifetime(key: &'static str, ttl: Option<TimeDelta>) -> Result<TimeDelta, ConfigError> {
    let max = TimeDelta::days(MAX_SESSION_DAYS);
    match ttl {
        Some(ttl) if ttl > TimeDelta::zero() && ttl <= max => Ok(ttl),
        _ => Err(ConfigError::InvalidValue {
            key,
            reason: format!("must be positive and at most {MAX_SESSION_DAYS} days"),
        }),
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The profile name is not one of development, testing, production.
    #[error("unknown configuration profile: {0}")]
    UnknownProfile(String),

    /// A setting is outside its accepted range.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `HUSKY_CONFIG` selects the profile
/// - `HUSKY_HOST` overrides `server.host`
/// - `HUSKY_PORT` overrides `server.port`
/// - `HUSKY_DB_PATH` overrides `database.path`
/// - `HUSKY_LOG_LEVEL` overrides `logging.level`
/// - `HUSKY_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `HUSKY_POSTS_PER_PAGE` overrides `blog.posts_per_page`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// if `HUSKY_CONFIG` names an unknown profile, or if a session lifetime is
/// out of range.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Applies `HUSKY_*` overrides read through `lookup`.
fn apply_env_overrides(
    mut config: Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    if let Some(profile) = lookup("HUSKY_CONFIG") {
        config.profile = profile.parse()?;
    }
    if let Some(host) = lookup("HUSKY_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("HUSKY_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = lookup("HUSKY_DB_PATH") {
        config.database.path = Some(db_path);
    }
    if let Some(level) = lookup("HUSKY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("HUSKY_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(per_page) = lookup("HUSKY_POSTS_PER_PAGE") {
        if let Ok(parsed) = per_page.parse::<u32>() {
            if parsed > 0 {
                config.blog.posts_per_page = parsed;
            }
        }
    }

    Ok(config)
}
