//! Provider registry with fail-fast lookup.

use crate::providers::{self, ProviderDescriptor};
use crate::{Error, ModelDescriptor, Result};

/// Catalog of providers keyed by id, in registration order.
///
/// Constructed explicitly and handed to the session, so tests can register
/// fakes instead of the built-in catalog.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the shipped providers: OpenAI, DeepSeek and Doubao
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(providers::openai::descriptor());
        registry.register(providers::deepseek::descriptor());
        registry.register(providers::doubao::descriptor());
        registry
    }

    /// Add a provider, replacing any existing one with the same id
    pub fn register(&mut self, provider: ProviderDescriptor) {
        match self.providers.iter_mut().find(|p| p.id == provider.id) {
            Some(existing) => *existing = provider,
            None => self.providers.push(provider),
        }
    }

    /// Look up a provider by id
    pub fn resolve(&self, provider_id: &str) -> Result<&ProviderDescriptor> {
        self.providers
            .iter()
            .find(|p| p.id == provider_id)
            .ok_or_else(|| Error::UnknownProvider(provider_id.to_string()))
    }

    /// Look up a model offered by a provider
    pub fn model_for<'a>(
        &self,
        provider: &'a ProviderDescriptor,
        model_id: &str,
    ) -> Result<&'a ModelDescriptor> {
        provider.model(model_id)
    }

    /// All providers, in registration order
    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }
}
