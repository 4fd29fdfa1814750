// src/config.rs
use crate::errors::ShotlistError;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_GATEWAY_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_VISION_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_TEXT_MODEL: &str = "anthropic/claude-sonnet-4";
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Process settings. Credentials are deliberately absent: every request
/// carries its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub gateway_url: String,
    pub vision_model: String,
    pub text_model: String,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ShotlistError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ShotlistError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let timeout_secs = match lookup("SHOTLIST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                ShotlistError::Config(format!(
                    "SHOTLIST_TIMEOUT_SECS must be a positive integer, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            bind_addr: get("SHOTLIST_BIND", defaults.bind_addr),
            gateway_url: get("SHOTLIST_GATEWAY_URL", defaults.gateway_url),
            vision_model: get("SHOTLIST_VISION_MODEL", defaults.vision_model),
            text_model: get("SHOTLIST_TEXT_MODEL", defaults.text_model),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
