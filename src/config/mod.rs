//! Configuration management
//!
//! Configuration is read from `config.yml` and may be overridden with
//! `YATUBE_*` environment variables. Missing values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub seed: SeedConfig,
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
    8000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/yatube.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default TTL for cache entries, in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// How long a rendered home feed page stays cached
    #[serde(default = "default_index_ttl")]
    pub index_ttl_seconds: u64,
    /// Maximum number of entries held in memory
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            index_ttl_seconds: default_index_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_index_ttl() -> u64 {
    20
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Template configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory whose templates override the embedded ones
    #[serde(default = "default_templates_path")]
    pub path: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            path: default_templates_path(),
        }
    }
}

fn default_templates_path() -> PathBuf {
    PathBuf::from("templates")
}

/// Media (uploaded images) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Media root directory
    #[serde(default = "default_media_path")]
    pub path: PathBuf,
    /// Maximum image size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Accepted image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            path: default_media_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_media_path() -> PathBuf {
    PathBuf::from("media")
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/gif".to_string(),
        "image/png".to_string(),
        "image/jpeg".to_string(),
        "image/webp".to_string(),
        "image/bmp".to_string(),
    ]
}

impl MediaConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }
}

/// Pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            posts_per_page: default_posts_per_page(),
        }
    }
}

fn default_posts_per_page() -> u32 {
    10
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Add the `Secure` attribute to the session cookie
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            cookie_name: default_cookie_name(),
            secure_cookie: false,
        }
    }
}

fn default_session_days() -> i64 {
    14
}

fn default_cookie_name() -> String {
    "sessionid".to_string()
}

/// Data created at startup when missing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub groups: Vec<GroupSeed>,
}

/// A group to create at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSeed {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
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
    /// A missing or empty file yields the default configuration; invalid YAML
    /// is reported with its location.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
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

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides:
    ///
    /// - `YATUBE_SERVER_HOST`, `YATUBE_SERVER_PORT`
    /// - `YATUBE_DATABASE_DRIVER`, `YATUBE_DATABASE_URL`
    /// - `YATUBE_CACHE_INDEX_TTL_SECONDS`
    /// - `YATUBE_TEMPLATES_PATH`
    /// - `YATUBE_MEDIA_PATH`
    /// - `YATUBE_PAGINATION_POSTS_PER_PAGE`
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pagination.posts_per_page == 0 {
            return Err(ConfigError::ValidationError(
                "pagination.posts_per_page must be greater than zero".to_string(),
            ));
        }
        if self.auth.session_days <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("YATUBE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("YATUBE_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(driver) = std::env::var("YATUBE_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("YATUBE_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("YATUBE_CACHE_INDEX_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.index_ttl_seconds = ttl;
            }
        }

        if let Ok(path) = std::env::var("YATUBE_TEMPLATES_PATH") {
            self.templates.path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("YATUBE_MEDIA_PATH") {
            self.media.path = PathBuf::from(path);
        }

        if let Ok(per_page) = std::env::var("YATUBE_PAGINATION_POSTS_PER_PAGE") {
            if let Ok(per_page) = per_page.parse::<u32>() {
                self.pagination.posts_per_page = per_page;
            }
        }
    }
}

/// Format YAML parsing error with its location
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
