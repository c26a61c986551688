//! Doubao (Volcengine Ark) provider

use std::sync::Arc;

use serde::Deserialize;

use super::{ProviderDescriptor, ResponseDecoder, first_content};
use crate::{ModelDescriptor, Result};

pub const PROVIDER_ID: &str = "doubao";
pub const ENDPOINT: &str = "https://ark.cn-beijing.volces.com/api/v3/chat/completions";

/// Built-in Doubao descriptor.
///
/// Ark addresses models by inference endpoint id rather than model name.
pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor::new(PROVIDER_ID, "Doubao", ENDPOINT, Arc::new(DoubaoDecoder))
        .with_api_key_env("ARK_API_KEY")
        .with_model(ModelDescriptor::new(
            "ep-20250205141518-nvl9p",
            "Doubao (ep-20250205141518-nvl9p)",
        ))
}

/// Decoder for Ark responses.
///
/// Ark always reports usage with prompt and completion token details; a body
/// without them is not an Ark chat completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubaoDecoder;

impl ResponseDecoder for DoubaoDecoder {
    fn decode(&self, body: &[u8]) -> Result<String> {
        let response: DoubaoResponse = serde_json::from_slice(body)?;
        let usage = &response.usage;

        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cached_tokens = usage.prompt_tokens_details.cached_tokens,
            reasoning_tokens = usage.completion_tokens_details.reasoning_tokens,
            "Doubao usage"
        );

        first_content(response.choices.into_iter().map(|c| c.message.content))
    }
}

#[derive(Debug, Deserialize)]
struct DoubaoResponse {
    choices: Vec<Choice>,
    usage: DoubaoUsage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DoubaoUsage {
    completion_tokens: u32,
    prompt_tokens: u32,
    prompt_tokens_details: PromptTokensDetails,
    completion_tokens_details: CompletionTokensDetails,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionTokensDetails {
    #[serde(default)]
    reasoning_tokens: u32,
}
