//! Environment configuration for the server binary.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use marquee_booking::BookingConfig;
use marquee_db::DbConfig;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub booking: BookingConfig,
}

impl ServerConfig {
    /// Read `MARQUEE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Unset keys fall back to
    /// the defaults of [`DbConfig`] and [`BookingConfig`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_defaults = DbConfig::default();
        let booking_defaults = BookingConfig::default();

        let db = DbConfig {
            url: text(&lookup, "MARQUEE_DB_URL", db_defaults.url),
            namespace: text(&lookup, "MARQUEE_DB_NS", db_defaults.namespace),
            database: text(&lookup, "MARQUEE_DB_NAME", db_defaults.database),
            username: optional(&lookup, "MARQUEE_DB_USER", db_defaults.username),
            password: optional(&lookup, "MARQUEE_DB_PASS", db_defaults.password),
        };

        let booking = BookingConfig {
            lock_timeout_ms: parsed(
                &lookup,
                "MARQUEE_LOCK_TIMEOUT_MS",
                booking_defaults.lock_timeout_ms,
            )?,
            response_grace_ms: parsed(
                &lookup,
                "MARQUEE_RESPONSE_GRACE_MS",
                booking_defaults.response_grace_ms,
            )?,
            max_conflict_attempts: parsed(
                &lookup,
                "MARQUEE_CONFLICT_ATTEMPTS",
                booking_defaults.max_conflict_attempts,
            )?,
        };

        Ok(Self { db, booking })
    }
}

fn text<F>(lookup: &F, key: &'static str, default: String) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default
    })
}

/// An empty value disables the credential.
fn optional<F>(lookup: &F, key: &'static str, default: Option<String>) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if value.is_empty() => None,
        Some(value) => Some(value),
        None => {
            info!("{key} not set, using default");
            default
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
