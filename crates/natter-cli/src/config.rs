//! Configuration file support

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use natter_ai::{ProviderDescriptor, RequestConfig};
use serde::{Deserialize, Serialize};

/// Provider used when neither the flags nor the file name one
pub const DEFAULT_PROVIDER: &str = "openai";

/// System prompt used when neither the flags nor the file set one
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Configuration for natter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default provider id
    pub provider: Option<String>,
    /// Default model id; falls back to the provider's first model
    pub model: Option<String>,
    /// Stream replies as they arrive (true by default)
    pub stream: Option<bool>,
    /// System prompt for new conversations
    pub system_prompt: Option<String>,
    /// API keys per provider id (alternative to environment variables)
    pub api_keys: BTreeMap<String, String>,
    /// Endpoint overrides per provider id
    pub endpoints: BTreeMap<String, String>,
    /// Extra fields merged into every request body
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("natter")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("NATTER_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Write the example config if no config file exists yet
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    /// Get the API key for a provider: config file, then the provider's
    /// environment variable, then the provider's built-in default.
    pub fn api_key(&self, provider: &ProviderDescriptor) -> Option<String> {
        self.api_key_with(provider, |var| std::env::var(var).ok())
    }

    fn api_key_with(
        &self,
        provider: &ProviderDescriptor,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        if let Some(key) = self.api_keys.get(&provider.id).filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }

        if let Some(key) = provider
            .api_key_env
            .as_deref()
            .and_then(env)
            .filter(|k| !k.is_empty())
        {
            return Some(key);
        }

        (!provider.default_api_key.is_empty()).then(|| provider.default_api_key.clone())
    }

    /// Assemble the request config for `provider`.
    ///
    /// `endpoint` overrides the `[endpoints]` table. A missing key is left
    /// unset so the request builder reports it.
    pub fn request_config(
        &self,
        provider: &ProviderDescriptor,
        model_id: &str,
        streaming: bool,
        endpoint: Option<&str>,
    ) -> RequestConfig {
        let mut config = RequestConfig::new(&provider.id, model_id).with_streaming(streaming);
        if let Some(key) = self.api_key(provider) {
            config = config.with_api_key(key);
        }
        if let Some(url) = endpoint.or(self.endpoints.get(&provider.id).map(String::as_str)) {
            config = config.with_endpoint(url);
        }
        for (key, value) in &self.extra {
            config = config.with_extra(key, value.clone());
        }
        config
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# natter configuration file
# Place at ~/.config/natter/config.toml (Linux) or set NATTER_CONFIG_PATH

# Default provider (openai, deepseek, doubao)
provider = "openai"

# Default model (run `natter --list-models` to see them)
model = "gpt-4o-mini"

# Stream replies token by token
stream = true

# System prompt for new conversations
system_prompt = "You are a helpful assistant."

# API keys (optional - OPENAI_API_KEY, DEEPSEEK_API_KEY and ARK_API_KEY
# are read from the environment otherwise)
[api_keys]
# openai = "sk-..."
# deepseek = "sk-..."
# doubao = "..."

# Endpoint overrides, e.g. for a local proxy
[endpoints]
# openai = "http://localhost:8080/v1/chat/completions"

# Extra fields added to every request body
[extra]
# temperature = 0.7
"#
}
