//! Configuration management for quizchain.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `QUIZ_SECRET` - Required. Shared secret inbound requests must present.
//! - `DEFAULT_MODEL` - Optional. The LLM model to use. Defaults to `openai/gpt-5-mini`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `FALLBACK_SUBMIT_URL` - Optional. Submission endpoint used when none can
//!   be discovered on the page. When unset, a chain with no discoverable
//!   endpoint terminates instead of posting blindly.
//! - `MAX_CHAIN_LENGTH` - Optional. Upper bound on cycles per chain. Defaults to `20`.
//! - `RENDER_TIMEOUT_MS` - Optional. Page navigation timeout. Defaults to `30000`.
//! - `RENDER_SETTLE_MS` - Optional. Extra wait after navigation for client-side
//!   scripts. Defaults to `2000`.
//! - `SUBMIT_TIMEOUT_MS` - Optional. Submission POST timeout. Defaults to `10000`.
//! - `EVAL_TIMEOUT_MS` - Optional. Wall-clock limit for evaluating synthesized
//!   programs. Defaults to `60000`.
//! - `PYTHON_BIN` - Optional. Interpreter used for evaluation. Defaults to `python3`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Service configuration, loaded once at startup and passed to each
/// component at construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: String,

    /// Shared secret inbound quiz tasks must match exactly
    pub quiz_secret: String,

    /// LLM model identifier (OpenRouter format)
    pub default_model: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Submission endpoint used when none can be discovered on the page
    pub fallback_submit_url: Option<String>,

    /// Upper bound on cycles per chain
    pub max_chain_length: usize,

    /// Page navigation timeout
    pub render_timeout: Duration,

    /// Settle delay after navigation, for client-side decoding scripts
    pub render_settle: Duration,

    /// Submission POST timeout
    pub submit_timeout: Duration,

    /// Wall-clock limit for evaluating a synthesized program
    pub eval_timeout: Duration,

    /// Interpreter binary for program evaluation
    pub python_bin: String,
}

fn env_duration_ms(name: &str, default_ms: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` or
    /// `QUIZ_SECRET` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let quiz_secret = std::env::var("QUIZ_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("QUIZ_SECRET".to_string()))?;

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "openai/gpt-5-mini".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let fallback_submit_url = std::env::var("FALLBACK_SUBMIT_URL").ok();

        let max_chain_length = std::env::var("MAX_CHAIN_LENGTH")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MAX_CHAIN_LENGTH".to_string(), format!("{}", e))
            })?;

        let python_bin = std::env::var("PYTHON_BIN").unwrap_or_else(|_| "python3".to_string());

        Ok(Self {
            api_key,
            quiz_secret,
            default_model,
            host,
            port,
            fallback_submit_url,
            max_chain_length,
            render_timeout: env_duration_ms("RENDER_TIMEOUT_MS", 30_000)?,
            render_settle: env_duration_ms("RENDER_SETTLE_MS", 2_000)?,
            submit_timeout: env_duration_ms("SUBMIT_TIMEOUT_MS", 10_000)?,
            eval_timeout: env_duration_ms("EVAL_TIMEOUT_MS", 60_000)?,
            python_bin,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, quiz_secret: String) -> Self {
        Self {
            api_key,
            quiz_secret,
            default_model: "openai/gpt-5-mini".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            fallback_submit_url: None,
            max_chain_length: 20,
            render_timeout: Duration::from_secs(30),
            render_settle: Duration::from_secs(2),
            submit_timeout: Duration::from_secs(10),
            eval_timeout: Duration::from_secs(60),
            python_bin: "python3".to_string(),
        }
    }
}
