use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const MIN_JWT_SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub replica: Option<ReplicaRuntimeConfig>,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: String,
    pub auth_clock_skew: Duration,
    pub scope_cache_ttl: Duration,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ReplicaRuntimeConfig {
    pub url: String,
    pub auth_token: String,
    pub sync_interval: Duration,
}

impl fmt::Debug for ReplicaRuntimeConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReplicaRuntimeConfig")
            .field("url", &self.url)
            .field("auth_token", &"[REDACTED]")
            .field("sync_interval", &self.sync_interval)
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("replica", &self.replica)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("auth_clock_skew", &self.auth_clock_skew)
            .field("scope_cache_ttl", &self.scope_cache_ttl)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "MOBSYNC_API_BIND_ADDR", "127.0.0.1:8080");
        let database_path = PathBuf::from(required_trimmed(&lookup, "MOBSYNC_DATABASE_PATH")?);

        let replica = parse_replica_config(&lookup)?;

        let jwt_secret = required_trimmed(&lookup, "SYNC_JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::Invalid(format!(
                "SYNC_JWT_SECRET must be at least {MIN_JWT_SECRET_BYTES} bytes"
            )));
        }
        let jwt_issuer = optional_trimmed(&lookup, "SYNC_JWT_ISSUER");
        let jwt_audience = value_or_default(&lookup, "SYNC_JWT_AUDIENCE", "mobile");

        let auth_clock_skew_secs =
            bounded_secs(&lookup, "AUTH_CLOCK_SKEW_SECS", "60", 0, 300)?;
        let scope_cache_ttl_secs =
            bounded_secs(&lookup, "SCOPE_CACHE_TTL_SECS", "30", 0, 600)?;

        Ok(Self {
            bind_addr,
            database_path,
            replica,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
            scope_cache_ttl: Duration::from_secs(scope_cache_ttl_secs),
        })
    }
}

fn parse_replica_config(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<ReplicaRuntimeConfig>, ConfigError> {
    let url = optional_trimmed(&lookup, "TURSO_DATABASE_URL");
    let auth_token = optional_trimmed(&lookup, "TURSO_AUTH_TOKEN");

    if url.is_none() && auth_token.is_none() {
        return Ok(None);
    }

    let url = url.ok_or(ConfigError::MissingVar("TURSO_DATABASE_URL"))?;
    let auth_token = auth_token.ok_or(ConfigError::MissingVar("TURSO_AUTH_TOKEN"))?;
    if !is_libsql_url(&url) {
        return Err(ConfigError::Invalid(
            "TURSO_DATABASE_URL must start with libsql://, https:// or http://".to_string(),
        ));
    }

    let sync_interval_secs = bounded_secs(&lookup, "TURSO_SYNC_INTERVAL_SECS", "60", 5, 3_600)?;

    Ok(Some(ReplicaRuntimeConfig {
        url,
        auth_token,
        sync_interval: Duration::from_secs(sync_interval_secs),
    }))
}

fn bounded_secs(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let value = value_or_default(lookup, name, default)
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]")))?;
    if !(min..=max).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{min}, {max}]"
        )));
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_libsql_url(value: &str) -> bool {
    value.starts_with("libsql://") || value.starts_with("https://") || value.starts_with("http://")
}
