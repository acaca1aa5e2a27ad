//! Configuration loaded from environment variables with sensible defaults.

use crate::error::{BookingError, Result};
use std::env;
use std::fmt;
use std::time::Duration;

pub const SECRET_KEY_VAR: &str = "CHAPA_SECRET_KEY";
pub const API_URL_VAR: &str = "CHAPA_API_URL";
pub const CALLBACK_URL_VAR: &str = "CHAPA_CALLBACK_URL";
pub const TIMEOUT_VAR: &str = "CHAPA_TIMEOUT_SECS";

pub const DEFAULT_API_URL: &str = "https://api.chapa.co/v1";
pub const DEFAULT_CALLBACK_URL: &str = "http://localhost:8000/api/payments/verify/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Payment gateway settings.
#[derive(Clone)]
pub struct GatewayConfig {
    pub secret_key: String,
    pub base_url: String,
    pub callback_url: String,
    /// Upper bound for each gateway request.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret_key = lookup(SECRET_KEY_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                BookingError::Configuration(format!("{SECRET_KEY_VAR} environment variable is not set"))
            })?;

        let base_url = lookup(API_URL_VAR)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let callback_url = lookup(CALLBACK_URL_VAR)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CALLBACK_URL.to_string());

        let timeout = match lookup(TIMEOUT_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|secs| *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .ok_or_else(|| {
                    BookingError::Configuration(format!(
                        "{TIMEOUT_VAR} must be a positive number of seconds, got {raw:?}"
                    ))
                })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            callback_url,
            timeout,
        })
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("callback_url", &self.callback_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
