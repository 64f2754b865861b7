//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (prefix: TRAILHEAD_, `__` separates sections)
//! 2. ./trailhead.toml in the working directory
//! 3. Default values
//!
//! The loaded [`Config`] is threaded into every component at construction;
//! nothing reads the environment after startup.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ReportMode, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Authentication and token configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Outbound mail configuration
    #[serde(default)]
    pub mail: MailConfig,

    /// Payment gateway configuration
    #[serde(default)]
    pub payments: PaymentConfig,

    /// Image upload configuration
    #[serde(default)]
    pub uploads: UploadConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment (development, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// How much failure detail is echoed back to clients
    #[serde(default)]
    pub error_detail: ReportMode,

    /// Public base URL used in mailed links
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request body size cap in kilobytes
    #[serde(default = "default_body_limit_kb")]
    pub body_limit_kb: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            port: default_port(),
            log_level: default_log_level(),
            environment: default_environment(),
            error_detail: ReportMode::default(),
            base_url: default_base_url(),
            body_limit_kb: default_body_limit_kb(),
        }
    }
}

impl ServiceConfig {
    /// Whether cookies should carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.environment == "production"
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret for credential tokens
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    /// Token lifetime in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    /// Cookie lifetime in days
    #[serde(default = "default_cookie_ttl_days")]
    pub cookie_ttl_days: i64,

    /// Password reset token lifetime in minutes
    #[serde(default = "default_reset_ttl_minutes")]
    pub reset_token_ttl_minutes: i64,

    /// Minimum accepted password length
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,

    /// Argon2 memory cost in KiB
    #[serde(default = "default_memory_cost_kib")]
    pub memory_cost_kib: u32,

    /// Argon2 iteration count
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,

    /// Argon2 lane count
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
            token_ttl_hours: default_token_ttl_hours(),
            cookie_ttl_days: default_cookie_ttl_days(),
            reset_token_ttl_minutes: default_reset_ttl_minutes(),
            min_password_length: default_min_password_length(),
            memory_cost_kib: default_memory_cost_kib(),
            time_cost: default_time_cost(),
            parallelism: default_parallelism(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per client address per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Rate limit window in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// Outbound mail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// From address on outbound mail
    #[serde(default = "default_mail_from")]
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: default_mail_from(),
        }
    }
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Webhook signing secret
    #[serde(default = "default_payment_secret")]
    pub signing_secret: String,

    /// ISO currency code for checkout sessions
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            signing_secret: default_payment_secret(),
            currency: default_currency(),
        }
    }
}

/// Image upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Root directory for stored images
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,

    /// Maximum accepted image size in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, ./trailhead.toml, and environment
    /// variables, in increasing priority.
    pub fn load() -> Result<Self> {
        Self::load_from("trailhead.toml")
    }

    /// Load configuration from a specific file path
    ///
    /// Useful for testing or non-standard deployments.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("TRAILHEAD_").split("__"))
            .extract()
            .map_err(|e| crate::error::Error::Config(Box::new(e)))?;
        Ok(config)
    }
}

fn default_service_name() -> String {
    "trailhead".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_body_limit_kb() -> usize {
    10_240
}

fn default_token_secret() -> String {
    // Placeholder for local development; deployments override via
    // TRAILHEAD_AUTH__TOKEN_SECRET.
    "trailhead-dev-secret-change-me".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_cookie_ttl_days() -> i64 {
    90
}

fn default_reset_ttl_minutes() -> i64 {
    10
}

fn default_min_password_length() -> usize {
    8
}

fn default_memory_cost_kib() -> u32 {
    19_456
}

fn default_time_cost() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    3600
}

fn default_mail_from() -> String {
    "Trailhead <hello@trailhead.example>".to_string()
}

fn default_payment_secret() -> String {
    "trailhead-dev-webhook-secret".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("public/img")
}

fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.service.port, 3000);
        assert_eq!(config.service.environment, "development");
        assert_eq!(config.service.error_detail, ReportMode::Restricted);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_secs, 3600);
        assert_eq!(config.auth.min_password_length, 8);
        assert_eq!(config.auth.reset_token_ttl_minutes, 10);
    }

    #[test]
    fn secure_cookies_follow_environment() {
        let mut config = Config::default();
        assert!(!config.service.secure_cookies());
        config.service.environment = "production".to_string();
        assert!(config.service.secure_cookies());
    }

    #[test]
    fn load_from_toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trailhead.toml");
        std::fs::write(
            &path,
            r#"
[service]
port = 4100
error_detail = "verbose"

[rate_limit]
max_requests = 5
"#,
        )
        .unwrap();

        let config = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.service.port, 4100);
        assert_eq!(config.service.error_detail, ReportMode::Verbose);
        assert_eq!(config.rate_limit.max_requests, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.auth.token_ttl_hours, 24);
    }
}
