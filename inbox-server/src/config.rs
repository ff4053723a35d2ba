//! Configuration module for environment variable parsing.
//!
//! Everything is read from environment variables with defaults; `validate`
//! rejects combinations that must fail at startup rather than per request.

use std::env;
use tracing::warn;

use crate::alias::generator::{DEFAULT_MAX_ATTEMPTS, DEFAULT_SUFFIX_LENGTH};
use crate::error::ConfigError;
use crate::store::memory::DEFAULT_MEMORY_STORE_CAPACITY;
use crate::web::signature::DEFAULT_MAX_SKEW_SECONDS;

/// Default upper bound for a single inbound body (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Mailgun signing key for HMAC signature verification
    pub mailgun_signing_key: Option<String>,

    /// Reject webhooks when no signing key is configured instead of
    /// accepting them unauthenticated
    pub mailgun_require_signature: bool,

    /// Maximum distance in seconds between webhook timestamp and server time
    pub mailgun_signature_max_skew: u64,

    /// Domain aliases live under; recipients on other domains are unknown
    pub alias_domain: Option<String>,

    /// Word list for generated aliases (defaults to the built-in list)
    pub alias_words: Option<Vec<String>>,

    /// Length of the random alias suffix
    pub alias_suffix_length: usize,

    /// Generation attempts before giving up on a unique alias
    pub alias_max_attempts: usize,

    /// Local parts to register at startup
    pub aliases: Vec<String>,

    /// Number of aliases to generate at startup
    pub alias_provision_count: usize,

    /// RabbitMQ connection URL; stored messages stay in memory when unset
    pub cloudamqp_url: Option<String>,

    /// Messages kept by the in-memory sink before the oldest are evicted
    pub memory_store_capacity: usize,

    /// Largest accepted inbound body in bytes
    pub max_body_bytes: usize,

    /// Mount the JSON `/dev/inbound` endpoint
    pub dev_inbound_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            mailgun_signing_key: None,
            mailgun_require_signature: false,
            mailgun_signature_max_skew: DEFAULT_MAX_SKEW_SECONDS,
            alias_domain: None,
            alias_words: None,
            alias_suffix_length: DEFAULT_SUFFIX_LENGTH,
            alias_max_attempts: DEFAULT_MAX_ATTEMPTS,
            aliases: Vec::new(),
            alias_provision_count: 0,
            cloudamqp_url: None,
            memory_store_capacity: DEFAULT_MEMORY_STORE_CAPACITY,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            dev_inbound_enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),

            mailgun_signing_key: env::var("MAILGUN_WEBHOOK_SIGNING_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),

            mailgun_require_signature: parse_bool(
                "MAILGUN_REQUIRE_SIGNATURE",
                defaults.mailgun_require_signature,
            ),

            mailgun_signature_max_skew: env::var("MAILGUN_SIGNATURE_MAX_SKEW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.mailgun_signature_max_skew),

            alias_domain: env::var("ALIAS_DOMAIN")
                .ok()
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty()),

            alias_words: parse_csv("ALIAS_WORDS"),

            alias_suffix_length: env::var("ALIAS_SUFFIX_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.alias_suffix_length),

            alias_max_attempts: env::var("ALIAS_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.alias_max_attempts),

            aliases: parse_csv("ALIASES").unwrap_or_default(),

            alias_provision_count: env::var("ALIAS_PROVISION_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.alias_provision_count),

            cloudamqp_url: env::var("CLOUDAMQP_URL").ok().filter(|u| !u.is_empty()),

            memory_store_capacity: env::var("MEMORY_STORE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.memory_store_capacity),

            max_body_bytes: env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_body_bytes),

            dev_inbound_enabled: parse_bool("DEV_INBOUND_ENABLED", defaults.dev_inbound_enabled),
        }
    }

    /// Reject configurations that cannot serve requests correctly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_key = self
            .mailgun_signing_key
            .as_ref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);

        if self.mailgun_require_signature && !has_key {
            return Err(ConfigError::MissingSigningKey);
        }

        if self.alias_suffix_length == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ALIAS_SUFFIX_LENGTH",
                message: "must be at least 1".to_string(),
            });
        }

        if self.alias_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ALIAS_MAX_ATTEMPTS",
                message: "must be at least 1".to_string(),
            });
        }

        if self.cloudamqp_url.is_none() && self.memory_store_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MEMORY_STORE_CAPACITY",
                message: "must be at least 1 when CLOUDAMQP_URL is unset".to_string(),
            });
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_BODY_BYTES",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Parse a boolean flag such as "true", "1", "yes" or "off".
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" | "" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
