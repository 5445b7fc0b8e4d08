use std::env;
use std::time::Duration;

use anyhow::{bail, Result};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

const DEFAULT_TIMEOUT_SECS: f64 = 90.0;
const MIN_TIMEOUT_SECS: f64 = 15.0;
const MAX_TIMEOUT_SECS: f64 = 300.0;

const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Credentials and transport settings for the Gemini backend. Built by the
/// host and handed to the backend; the engine never reads the environment on
/// its own.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self> {
        let Some(api_key) = API_KEY_VARS.iter().find_map(|key| non_empty_env(key)) else {
            bail!("{} not set", API_KEY_VARS.join(" or "));
        };
        let mut config = Self::new(api_key);
        if let Some(api_base) = non_empty_env("GEMINI_API_BASE") {
            config = config.with_api_base(api_base);
        }
        if let Some(model) = non_empty_env("RETOUCH_IMAGE_MODEL") {
            config = config.with_model(model);
        }
        if let Some(raw) = non_empty_env("RETOUCH_REQUEST_TIMEOUT") {
            config = config.with_timeout_secs(parse_timeout_secs(&raw));
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into();
        let trimmed = api_base.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            self.api_base = trimmed.to_string();
        }
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout_secs(mut self, seconds: f64) -> Self {
        self.request_timeout = Duration::from_secs_f64(clamp_timeout_secs(seconds));
        self
    }
}

fn parse_timeout_secs(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(DEFAULT_TIMEOUT_SECS)
}

fn clamp_timeout_secs(seconds: f64) -> f64 {
    if !seconds.is_finite() {
        return DEFAULT_TIMEOUT_SECS;
    }
    seconds.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
