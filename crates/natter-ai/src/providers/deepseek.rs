//! DeepSeek provider

use std::sync::Arc;

use serde::Deserialize;

use super::{ProviderDescriptor, ResponseDecoder, first_content};
use crate::{ModelDescriptor, Result};

pub const PROVIDER_ID: &str = "deepseek";
pub const ENDPOINT: &str = "https://api.deepseek.com/chat/completions";

/// Built-in DeepSeek descriptor
pub fn descriptor() -> ProviderDescriptor {
    ProviderDescriptor::new(PROVIDER_ID, "DeepSeek", ENDPOINT, Arc::new(DeepSeekDecoder))
        .with_api_key_env("DEEPSEEK_API_KEY")
        .with_model(ModelDescriptor::new("deepseek-chat", "DeepSeek Chat"))
        .with_model(ModelDescriptor::new("deepseek-r1", "DeepSeek R1"))
}

/// Decoder for DeepSeek responses, which report prompt-cache usage
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepSeekDecoder;

impl ResponseDecoder for DeepSeekDecoder {
    fn decode(&self, body: &[u8]) -> Result<String> {
        let response: DeepSeekResponse = serde_json::from_slice(body)?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                cache_hit = usage.prompt_cache_hit_tokens,
                cache_miss = usage.prompt_cache_miss_tokens,
                "DeepSeek usage"
            );
        }

        first_content(response.choices.into_iter().map(|c| c.message.content))
    }
}

#[derive(Debug, Deserialize)]
struct DeepSeekResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    usage: Option<DeepSeekUsage>,
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
struct DeepSeekUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[serde(default)]
    prompt_cache_hit_tokens: u32,
    #[serde(default)]
    prompt_cache_miss_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::providers::openai::ChatCompletionDecoder;

    const FIXTURE: &str = r#"{
        "id": "930c60df-bf64-41c9-a88e-3ec75f81e00e",
        "object": "chat.completion",
        "created": 1705651092,
        "model": "deepseek-chat",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hi there"},
            "logprobs": null,
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 16,
            "completion_tokens": 10,
            "total_tokens": 26,
            "prompt_tokens_details": {"cached_tokens": 0},
            "prompt_cache_hit_tokens": 0,
            "prompt_cache_miss_tokens": 16
        },
        "system_fingerprint": "fp_a49d71b8a1"
    }"#;

    #[test]
    fn test_decode_deepseek_envelope() {
        assert_eq!(DeepSeekDecoder.decode(FIXTURE.as_bytes()).unwrap(), "Hi there");
    }

    #[test]
    fn test_agrees_with_default_decoder() {
        let ours = DeepSeekDecoder.decode(FIXTURE.as_bytes()).unwrap();
        let default = ChatCompletionDecoder.decode(FIXTURE.as_bytes()).unwrap();
        assert_eq!(ours, default);
    }

    #[test]
    fn test_decode_without_usage() {
        let body = br#"{"model":"deepseek-chat","choices":[{"message":{"content":"ok"}}]}"#;
        assert_eq!(DeepSeekDecoder.decode(body).unwrap(), "ok");
    }

    #[test]
    fn test_decode_rejects_malformed_usage() {
        let body = br#"{"choices":[{"message":{"content":"ok"}}],"usage":{"prompt_tokens":"many"}}"#;
        assert!(matches!(DeepSeekDecoder.decode(body), Err(Error::Json(_))));
    }
}
