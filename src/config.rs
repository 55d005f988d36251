//! Environment-driven configuration.
//!
//! Every key has a default suitable for local development against a backend
//! on `localhost:8000`.  Unset keys are logged at `info`; keys that are set
//! but do not parse are a hard error rather than a silent fallback.

use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, without a trailing slash.
    pub api_base: String,
    /// Timeout applied to each cards request (not to the event stream).
    pub request_timeout: Duration,
    pub log_file: String,
}

impl Config {
    /// Load from the process environment.  `api_base_override` (the first CLI
    /// argument, if any) wins over `NEWSFACES_API_BASE`.
    pub fn load(api_base_override: Option<String>) -> Result<Self, ConfigError> {
        let api_base = match api_base_override {
            Some(base) => base,
            None => try_load("NEWSFACES_API_BASE", DEFAULT_API_BASE)?,
        };
        let timeout_secs: u64 = try_load("NEWSFACES_REQUEST_TIMEOUT_SECS", "20")?;

        Ok(Self {
            api_base: normalize_base(&api_base),
            request_timeout: Duration::from_secs(timeout_secs),
            log_file: try_load("NEWSFACES_LOG_FILE", "newsfaces-live.log")?,
        })
    }

    pub fn cards_url(&self) -> String {
        format!("{}/people/cards", self.api_base)
    }

    pub fn events_url(&self) -> String {
        format!("{}/events", self.api_base)
    }
}

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }
    })
}
