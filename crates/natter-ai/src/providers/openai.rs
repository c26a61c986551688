//! OpenAI Chat Completions provider

use std::sync::Arc;

use serde::Deserialize;

use super::{ProviderDescriptor, ResponseDecoder, first_content};
use crate::{ModelDescriptor, Result};

pub const PROVIDER_ID: &str = "openai";
pub const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Built-in OpenAI descriptor
pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor::new(PROVIDER_ID, "OpenAI", ENDPOINT, Arc::new(ChatCompletionDecoder))
        .with_api_key_env("OPENAI_API_KEY")
        .with_model(ModelDescriptor::new("gpt-4o-mini", "GPT-4o mini"))
        .with_model(ModelDescriptor::new("gpt-4o", "GPT-4o"))
}

/// Decoder for the default `choices[0].message.content` envelope.
///
/// Only the fields it needs are required, so it also serves
/// OpenAI-compatible gateways.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatCompletionDecoder;

impl ResponseDecoder for ChatCompletionDecoder {
    fn decode(&self, body: &[u8]) -> Result<String> {
        let response: ChatCompletion = serde_json::from_slice(body)?;
        first_content(response.choices.into_iter().map(|c| c.message.content))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
