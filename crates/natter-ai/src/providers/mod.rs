//! Chat-completion providers and their response decoders

pub mod deepseek;
pub mod doubao;
pub mod openai;

use std::fmt;
use std::sync::Arc;

use crate::{Error, ModelDescriptor, Result};

/// Extracts the assistant text from a provider's non-streaming response body.
///
/// Implementations are stateless: the same bytes always decode to the same
/// result.
pub trait ResponseDecoder: Send + Sync {
    /// Decode a complete response body
    fn decode(&self, body: &[u8]) -> Result<String>;
}

/// Static description of a configured provider
#[derive(Clone)]
pub struct ProviderDescriptor {
    /// Registry key, e.g. "openai"
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Full chat-completions endpoint
    pub base_url: String,
    /// Key used when the request config has no override. Empty means none.
    pub default_api_key: String,
    /// Environment variable the config layer may read the key from
    pub api_key_env: Option<String>,
    /// Models this provider accepts
    pub models: Vec<ModelDescriptor>,
    /// Decoder for non-streaming responses
    pub decoder: Arc<dyn ResponseDecoder>,
}

impl ProviderDescriptor {
    /// Create a provider with no models and an empty default key
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        base_url: impl Into<String>,
        decoder: Arc<dyn ResponseDecoder>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            base_url: base_url.into(),
            default_api_key: String::new(),
            api_key_env: None,
            models: Vec::new(),
            decoder,
        }
    }

    pub fn with_model(mut self, model: ModelDescriptor) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_default_api_key(mut self, key: impl Into<String>) -> Self {
        self.default_api_key = key.into();
        self
    }

    pub fn with_api_key_env(mut self, env_var: impl Into<String>) -> Self {
        self.api_key_env = Some(env_var.into());
        self
    }

    /// Find a model by id, failing on unknown ids
    pub fn model(&self, model_id: &str) -> Result<&ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.id == model_id)
            .ok_or_else(|| Error::UnknownModel {
                provider: self.id.clone(),
                model: model_id.to_string(),
            })
    }

    /// Decode a non-streaming body with this provider's decoder
    pub fn decode(&self, body: &[u8]) -> Result<String> {
        self.decoder.decode(body)
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("base_url", &self.base_url)
            .field("api_key_env", &self.api_key_env)
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

/// Take `choices[0].message.content`, shared by every chat-completions envelope
pub(crate) fn first_content<I>(contents: I) -> Result<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    contents
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| Error::Decode("response has no choices[0].message.content".into()))
}
