// src/config/mod.rs
// Environment-driven configuration for the completion gateway and CLI

use once_cell::sync::Lazy;
use std::str::FromStr;

use crate::llm::provider::openai::DEFAULT_AZURE_API_VERSION;

#[derive(Debug, Clone)]
pub struct ParleyConfig {
    // ── Provider
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub azure_api_version: String,
    pub timeout_secs: u64,

    // ── Sampling defaults
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,

    // ── Agent
    pub work_mode: String,

    // ── Logging
    pub log_level: String,

    api_keys: Vec<String>,
}

// Values may carry trailing `# comments` when they come from a .env file
fn clean_value(raw: &str) -> &str {
    raw.split('#').next().unwrap_or("").trim()
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => match clean_value(&val).parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_var_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    let val = std::env::var(key).ok()?;
    let clean = clean_value(&val);
    if clean.is_empty() {
        return None;
    }
    match clean.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            eprintln!("Config: {} = '{}' (parse failed, ignoring)", key, val);
            None
        }
    }
}

/// Comma-separated key list. Not run through `clean_value`: keys may contain '#'.
fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

impl ParleyConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            provider: env_var_or("PARLEY_PROVIDER", "openai".to_string()),
            model: env_var_or("PARLEY_MODEL", "gpt-4o".to_string()),
            base_url: env_var_opt("PARLEY_BASE_URL"),
            azure_api_version: env_var_or("PARLEY_AZURE_API_VERSION", DEFAULT_AZURE_API_VERSION.to_string()),
            timeout_secs: env_var_or("PARLEY_TIMEOUT_SECS", 60),
            temperature: env_var_opt("PARLEY_TEMPERATURE"),
            max_tokens: env_var_opt("PARLEY_MAX_TOKENS"),
            work_mode: env_var_or("PARLEY_WORK_MODE", "task".to_string()),
            log_level: env_var_or("PARLEY_LOG_LEVEL", "info".to_string()),
            api_keys: std::env::var("PARLEY_API_KEYS")
                .map(|raw| parse_key_list(&raw))
                .unwrap_or_default(),
        }
    }

    /// Build a config without touching the environment (tests, embedding apps)
    pub fn new(provider: impl Into<String>, model: impl Into<String>, api_keys: Vec<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            base_url: None,
            azure_api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            timeout_secs: 60,
            temperature: None,
            max_tokens: None,
            work_mode: "task".to_string(),
            log_level: "info".to_string(),
            api_keys,
        }
    }

    pub fn api_keys(&self) -> &[String] {
        &self.api_keys
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    pub fn is_debug(&self) -> bool {
        matches!(self.log_level.to_lowercase().as_str(), "debug" | "trace")
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<ParleyConfig> = Lazy::new(ParleyConfig::from_env);
