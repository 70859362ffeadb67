//! Runtime configuration.
//!
//! Values come from the process environment, a `.env` file during desktop
//! development, or the bundled `assets/config.env` for packaged builds. The
//! bundled file never overrides a key that is already set.

use crate::admin::AdminSecret;
use std::env;
use std::path::PathBuf;

/// Bundled config for packaged builds (mobile, web)
const BUNDLED_CONFIG: &str = include_str!("../assets/config.env");

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://127.0.0.1:11434/api/chat";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:7b";
pub const DEFAULT_LOG_FILE: &str = "chat_history.csv";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Sampling temperature sent with every completion request.
pub const TEMPERATURE: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a 64 character hex SHA-256 digest")]
    InvalidDigest { key: &'static str },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProviderConfig {
    /// Hosted OpenAI-compatible chat completions (DeepSeek by default).
    DeepSeek {
        base_url: String,
        api_key: Option<String>,
        model: String,
    },
    /// Local Ollama server, handy when working offline.
    Ollama { endpoint: String, model: String },
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::DeepSeek { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CoachConfig {
    pub provider: ProviderConfig,
    pub temperature: f32,
    pub log_path: PathBuf,
    pub origin_address: Option<String>,
    pub admin_secret: AdminSecret,
}

impl CoachConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let get = |key: &str| raw(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let use_ollama = get("LLM_USE_OLLAMA").is_some_and(|v| is_truthy(&v));
        let provider = if use_ollama {
            ProviderConfig::Ollama {
                endpoint: get("OLLAMA_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_OLLAMA_ENDPOINT.to_string()),
                model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            }
        } else {
            ProviderConfig::DeepSeek {
                base_url: get("DEEPSEEK_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                api_key: get("DEEPSEEK_API_KEY"),
                model: get("COACH_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            }
        };

        let admin_secret = match get("ADMIN_PASSWORD_SHA256") {
            Some(digest) => AdminSecret::from_sha256_hex(&digest).ok_or(
                ConfigError::InvalidDigest {
                    key: "ADMIN_PASSWORD_SHA256",
                },
            )?,
            // compared exactly, surrounding whitespace included
            None => AdminSecret::Plain(
                raw("ADMIN_PASSWORD").unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
            ),
        };

        Ok(Self {
            provider,
            temperature: TEMPERATURE,
            log_path: get("COACH_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            origin_address: get("COACH_ORIGIN_ADDRESS"),
            admin_secret,
        })
    }
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::DeepSeek {
                base_url: DEFAULT_BASE_URL.to_string(),
                api_key: None,
                model: DEFAULT_MODEL.to_string(),
            },
            temperature: TEMPERATURE,
            log_path: PathBuf::from(DEFAULT_LOG_FILE),
            origin_address: None,
            admin_secret: AdminSecret::Plain(DEFAULT_ADMIN_PASSWORD.to_string()),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(not(target_arch = "wasm32"))]
pub fn load_dotenv() {
    // .env first (desktop dev), then bundled defaults for whatever is still unset
    dotenvy::dotenv().ok();
    load_bundled_config();
}

#[cfg(target_arch = "wasm32")]
pub fn load_dotenv() {
    load_bundled_config();
}

fn load_bundled_config() {
    for (key, value) in unset_bundled_keys(BUNDLED_CONFIG, |key| env::var(key).is_ok()) {
        // SAFETY: We're setting env vars at startup before any threads are spawned
        unsafe {
            env::set_var(key, value);
        }
    }
}

/// Bundled entries whose key is not already set.
fn unset_bundled_keys<'a, F>(source: &'a str, is_set: F) -> Vec<(&'a str, &'a str)>
where
    F: Fn(&str) -> bool,
{
    parse_env_lines(source)
        .into_iter()
        .filter(|(key, _)| !is_set(key))
        .collect()
}

/// Parses `KEY=VALUE` lines, skipping blanks and `#` comments.
pub fn parse_env_lines(source: &str) -> Vec<(&str, &str)> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect()
}
