//! Generation parameters and provider connection settings

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::LlmError;

/// Parameters for controlling text generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Randomness (0.0-1.0, higher = more random)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Top-k sampling (Anthropic and Ollama only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Stop generation when these sequences are encountered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl GenerationConfig {
    /// Create a new configuration with the specified max tokens
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the top_p value
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set the top_k value
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Set stop sequences
    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(stop_sequences);
        self
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: None,
            top_p: None,
            top_k: None,
            stop_sequences: None,
        }
    }
}

/// Supported LLM vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Ollama,
    /// Moonshot AI's Kimi models
    Kimi,
    DeepSeek,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Ollama,
        ProviderKind::Kimi,
        ProviderKind::DeepSeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Kimi => "kimi",
            ProviderKind::DeepSeek => "deepseek",
        }
    }

    /// API base URL used when none is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::Kimi => "https://api.moonshot.cn/v1",
            ProviderKind::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-sonnet-4-5",
            ProviderKind::Ollama => "llama3.2",
            ProviderKind::Kimi => "moonshot-v1-8k",
            ProviderKind::DeepSeek => "deepseek-chat",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }

    /// Prefix of this provider's environment variables, e.g. `KIMI`
    fn env_prefix(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI",
            ProviderKind::Anthropic => "ANTHROPIC",
            ProviderKind::Ollama => "OLLAMA",
            ProviderKind::Kimi => "KIMI",
            ProviderKind::DeepSeek => "DEEPSEEK",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "ollama" => Ok(ProviderKind::Ollama),
            "kimi" | "moonshot" => Ok(ProviderKind::Kimi),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            other => Err(LlmError::Configuration(format!(
                "unknown provider '{}', expected one of: openai, anthropic, ollama, kimi, deepseek",
                other
            ))),
        }
    }
}

/// Connection settings for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    /// Overrides the provider's default API base URL
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Settings with the provider's default model and no key
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: kind.default_model().to_string(),
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Read `<PREFIX>_API_KEY`, `<PREFIX>_MODEL` and `<PREFIX>_BASE_URL`
    ///
    /// Kimi also accepts `MOONSHOT_API_KEY`.
    pub fn from_env(kind: ProviderKind) -> Result<Self, LlmError> {
        Self::from_lookup(kind, |name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(
        kind: ProviderKind,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, LlmError> {
        let prefix = kind.env_prefix();
        let var = |suffix: &str| {
            lookup(&format!("{}_{}", prefix, suffix)).filter(|value| !value.trim().is_empty())
        };

        let mut api_key = var("API_KEY");
        if api_key.is_none() && kind == ProviderKind::Kimi {
            api_key = lookup("MOONSHOT_API_KEY").filter(|value| !value.trim().is_empty());
        }

        let config = Self {
            kind,
            model: var("MODEL").unwrap_or_else(|| kind.default_model().to_string()),
            api_key,
            base_url: var("BASE_URL"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Fail early on settings the provider cannot work with
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.model.trim().is_empty() {
            return Err(LlmError::Configuration(format!(
                "{} model name must not be empty",
                self.kind
            )));
        }
        if self.kind.requires_api_key() && self.api_key.is_none() {
            return Err(LlmError::Configuration(format!(
                "{} requires an API key (set {}_API_KEY)",
                self.kind,
                self.kind.env_prefix()
            )));
        }
        Ok(())
    }

    /// Configured base URL without a trailing slash
    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}
