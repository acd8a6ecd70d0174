//! Configuration types for card generation.
//!
//! Two structs split the knobs by lifetime:
//!
//! * [`ClientConfig`]: how to reach the Mistral API (key, base URL,
//!   timeout). Read once at process start, validated explicitly with
//!   [`ClientConfig::validate`] before [`crate::provider::MistralClient::new`]
//!   is called.
//! * [`GenerationConfig`]: how the pipeline behaves (models, temperatures,
//!   token ceilings, retry policy, limits). Built via
//!   [`GenerationConfig::builder()`].

use crate::error::AnkiForgeError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default Mistral REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";

/// Minimum length of a plausible Mistral API key.
const MIN_API_KEY_LEN: usize = 32;

/// Deployment environment; production refuses test keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    fn from_env_value(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Connection settings for the Mistral API.
#[derive(Clone)]
pub struct ClientConfig {
    /// API key; `None` until read from the environment or set explicitly.
    pub api_key: Option<String>,

    /// Base URL without trailing slash. Default: `https://api.mistral.ai`.
    pub base_url: String,

    /// Request timeout in seconds, applied to every HTTP call. Default: 120.
    ///
    /// The pipeline has no timeout of its own; a stuck OCR or generation
    /// call ends only when this fires.
    pub timeout_secs: u64,

    pub environment: Environment,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
            environment: Environment::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("environment", &self.environment)
            .finish()
    }
}

impl ClientConfig {
    /// Read `MISTRAL_API_KEY`, `MISTRAL_BASE_URL` and `ANKIFORGE_ENV`.
    ///
    /// Does not validate; call [`ClientConfig::validate`] afterwards.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("MISTRAL_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("MISTRAL_BASE_URL") {
            if !url.is_empty() {
                config.base_url = url.trim_end_matches('/').to_string();
            }
        }
        if let Ok(env) = std::env::var("ANKIFORGE_ENV") {
            config.environment = Environment::from_env_value(&env);
        }
        config
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Check the API key and return it.
    ///
    /// Rules: present, at least 32 characters, only `[A-Za-z0-9_-]`, and
    /// not a `test_` key when running in production.
    pub fn validate(&self) -> Result<&str, AnkiForgeError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(AnkiForgeError::MissingApiKey)?;

        if key.len() < MIN_API_KEY_LEN {
            return Err(AnkiForgeError::InvalidApiKey(format!(
                "key seems too short (minimum {MIN_API_KEY_LEN} characters)"
            )));
        }

        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AnkiForgeError::InvalidApiKey(
                "unexpected characters; expected letters, digits, '_' or '-'".into(),
            ));
        }

        if self.environment == Environment::Production && key.starts_with("test_") {
            return Err(AnkiForgeError::InvalidApiKey(
                "cannot use a test key in production".into(),
            ));
        }

        Ok(key)
    }
}

/// Behaviour of the generation pipeline and the chat tutor.
///
/// # Example
/// ```rust
/// use ankiforge::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .max_retries(5)
///     .retry_backoff_ms(1000)
///     .build()
///     .unwrap();
/// assert_eq!(config.retry.max_retries, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Chat model used for card generation and the tutor.
    pub generation_model: String,

    /// OCR model used for PDFs and images.
    pub ocr_model: String,

    /// Sampling temperature for card generation. Default: 0.2.
    ///
    /// Kept low so repeated submissions of the same text give comparable decks.
    pub temperature: f32,

    /// Output-token ceiling for card generation. Default: 10 000.
    ///
    /// Fifteen kanji cards with example sentences easily pass 4 000 tokens; a
    /// truncated response fails schema parsing and is reported as an error.
    pub max_tokens: usize,

    /// Sampling temperature for tutor replies. Default: 0.3.
    pub chat_temperature: f32,

    /// Output-token ceiling for tutor replies. Default: 500.
    pub chat_max_tokens: usize,

    /// Prior user/assistant turns sent as tutor context. Default: 4.
    pub chat_context_turns: usize,

    /// Backoff policy shared by every network call.
    pub retry: RetryPolicy,

    /// Largest accepted upload, in megabytes. Default: 10.
    pub max_file_size_mb: u64,

    /// Chat messages kept in memory and storage. Default: 50.
    pub message_capacity: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            generation_model: "mistral-large-latest".to_string(),
            ocr_model: "mistral-ocr-latest".to_string(),
            temperature: 0.2,
            max_tokens: 10_000,
            chat_temperature: 0.3,
            chat_max_tokens: 500,
            chat_context_turns: 4,
            retry: RetryPolicy::default(),
            max_file_size_mb: 10,
            message_capacity: 50,
        }
    }
}

impl GenerationConfig {
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 1.5);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn chat_temperature(mut self, t: f32) -> Self {
        self.config.chat_temperature = t.clamp(0.0, 1.5);
        self
    }

    pub fn chat_max_tokens(mut self, n: usize) -> Self {
        self.config.chat_max_tokens = n;
        self
    }

    pub fn chat_context_turns(mut self, n: usize) -> Self {
        self.config.chat_context_turns = n;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry.base_delay_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry.max_delay_ms = ms;
        self
    }

    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.config.max_file_size_mb = mb;
        self
    }

    pub fn message_capacity(mut self, n: usize) -> Self {
        self.config.message_capacity = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, AnkiForgeError> {
        let c = &self.config;
        if c.max_tokens == 0 || c.chat_max_tokens == 0 {
            return Err(AnkiForgeError::InvalidConfig(
                "token ceilings must be ≥ 1".into(),
            ));
        }
        if c.message_capacity == 0 {
            return Err(AnkiForgeError::InvalidConfig(
                "message capacity must be ≥ 1".into(),
            ));
        }
        if c.retry.max_delay_ms < c.retry.base_delay_ms {
            return Err(AnkiForgeError::InvalidConfig(format!(
                "max backoff ({}ms) is below the base backoff ({}ms)",
                c.retry.max_delay_ms, c.retry.base_delay_ms
            )));
        }
        if c.generation_model.is_empty() || c.ocr_model.is_empty() {
            return Err(AnkiForgeError::InvalidConfig("model ids must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

    #[test]
    fn defaults_match_pipeline_constants() {
        let c = GenerationConfig::default();
        assert_eq!(c.temperature, 0.2);
        assert_eq!(c.max_tokens, 10_000);
        assert_eq!(c.retry.max_retries, 3);
        assert_eq!(c.retry.base_delay_ms, 2000);
        assert_eq!(c.message_capacity, 50);
    }

    #[test]
    fn builder_rejects_zero_capacity() {
        let err = GenerationConfig::builder()
            .message_capacity(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn builder_rejects_ceiling_below_base() {
        assert!(GenerationConfig::builder()
            .retry_backoff_ms(5000)
            .max_backoff_ms(1000)
            .build()
            .is_err());
    }

    #[test]
    fn missing_key_is_reported() {
        let err = ClientConfig::default().validate().unwrap_err();
        assert!(matches!(err, AnkiForgeError::MissingApiKey));
    }

    #[test]
    fn short_key_is_rejected() {
        let err = ClientConfig::default()
            .with_api_key("short")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn key_with_bad_chars_is_rejected() {
        let key = format!("{GOOD_KEY}!!");
        assert!(ClientConfig::default().with_api_key(key).validate().is_err());
    }

    #[test]
    fn test_key_refused_in_production_only() {
        let key = format!("test_{GOOD_KEY}");
        let dev = ClientConfig::default().with_api_key(key.clone());
        assert!(dev.validate().is_ok());

        let mut prod = dev;
        prod.environment = Environment::Production;
        assert!(prod.validate().is_err());
    }

    #[test]
    fn valid_key_is_returned() {
        let config = ClientConfig::default().with_api_key(GOOD_KEY);
        assert_eq!(config.validate().unwrap(), GOOD_KEY);
    }

    #[test]
    fn debug_redacts_key() {
        let config = ClientConfig::default().with_api_key(GOOD_KEY);
        let dbg = format!("{config:?}");
        assert!(!dbg.contains(GOOD_KEY));
        assert!(dbg.contains("redacted"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = ClientConfig::default().with_base_url("http://localhost:8080/");
        assert_eq!(config.base_url, "http://localhost:8080");
    }
}
