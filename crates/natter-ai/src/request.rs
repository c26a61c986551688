//! Request building: conversation + config -> transport-ready request

use std::time::Duration;

use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;

use crate::registry::ProviderRegistry;
use crate::{Error, Message, RequestConfig, Result, Role};

/// Timeout applied to non-streaming requests
pub const NON_STREAMING_TIMEOUT: Duration = Duration::from_secs(30);

/// Body keys that `RequestConfig::extra` may not replace
const RESERVED_KEYS: [&str; 4] = ["model", "messages", "stream", "format"];

/// A fully resolved HTTP request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub provider_id: String,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
    pub streaming: bool,
    pub timeout: Option<Duration>,
}

/// Builds [`ChatRequest`]s against a provider registry. Never touches the
/// conversation it is given.
pub struct RequestBuilder<'a> {
    registry: &'a ProviderRegistry,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(registry: &'a ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Compose the request for one new user turn on top of `history`
    pub fn build(
        &self,
        history: &[Message],
        user_text: &str,
        config: &RequestConfig,
    ) -> Result<ChatRequest> {
        let provider = self.registry.resolve(&config.provider_id)?;
        let model = self.registry.model_for(provider, &config.model_id)?;

        let api_key = config
            .api_key_override
            .as_deref()
            .unwrap_or(&provider.default_api_key);
        if api_key.is_empty() {
            return Err(Error::MissingApiKey(provider.id.clone()));
        }

        let endpoint = config
            .endpoint_override
            .as_deref()
            .unwrap_or(&provider.base_url);
        let url = parse_endpoint(endpoint)?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| Error::InvalidConfig("API key contains invalid header characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if config.streaming {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }

        let mut messages: Vec<WireMessage<'_>> = history.iter().map(WireMessage::from).collect();
        messages.push(WireMessage {
            role: Role::User.as_str(),
            content: user_text,
        });

        let extra = config
            .extra
            .iter()
            .filter(|(key, _)| {
                let reserved = RESERVED_KEYS.contains(&key.as_str());
                if reserved {
                    tracing::warn!("Ignoring extra body field '{}': reserved", key);
                }
                !reserved
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let body = serde_json::to_value(ChatBody {
            model: &model.id,
            messages,
            format: "text",
            stream: config.streaming,
            extra,
        })?;

        tracing::debug!(provider = %provider.id, model = %model.id, url = %url, stream = config.streaming, "Built chat request");

        Ok(ChatRequest {
            provider_id: provider.id.clone(),
            url,
            headers,
            body,
            streaming: config.streaming,
            timeout: (!config.streaming).then_some(NON_STREAMING_TIMEOUT),
        })
    }
}

/// Parse an endpoint, accepting only absolute http(s) URLs
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint).map_err(|e| Error::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidEndpoint(format!(
            "{}: unsupported scheme '{}'",
            endpoint, other
        ))),
    }
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    format: &'static str,
    stream: bool,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(m: &'a Message) -> Self {
        Self {
            role: m.role.as_str(),
            content: &m.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn history() -> Vec<Message> {
        vec![
            Message::system("You are terse."),
            Message::user("Hello"),
            Message::assistant("Hi"),
        ]
    }

    fn config() -> RequestConfig {
        RequestConfig::new("openai", "gpt-4o-mini").with_api_key("sk-test")
    }

    #[test]
    fn test_build_body_and_headers() {
        let registry = ProviderRegistry::builtin();
        let req = RequestBuilder::new(&registry)
            .build(&history(), "How are you?", &config())
            .unwrap();

        assert_eq!(req.url.as_str(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(req.headers[AUTHORIZATION], "Bearer sk-test");
        assert_eq!(req.headers[CONTENT_TYPE], "application/json");
        assert!(req.headers.get(ACCEPT).is_none());
        assert_eq!(
            req.body,
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "You are terse."},
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi"},
                    {"role": "user", "content": "How are you?"}
                ],
                "format": "text",
                "stream": false
            })
        );
        assert_eq!(req.timeout, Some(NON_STREAMING_TIMEOUT));
    }

    #[test]
    fn test_build_streaming() {
        let registry = ProviderRegistry::builtin();
        let req = RequestBuilder::new(&registry)
            .build(&history(), "x", &config().with_streaming(true))
            .unwrap();
        assert!(req.streaming);
        assert_eq!(req.body["stream"], json!(true));
        assert_eq!(req.headers[ACCEPT], "text/event-stream");
        assert!(req.timeout.is_none());
    }

    #[test]
    fn test_build_does_not_touch_history() {
        let registry = ProviderRegistry::builtin();
        let h = history();
        RequestBuilder::new(&registry).build(&h, "x", &config()).unwrap();
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn test_endpoint_override() {
        let registry = ProviderRegistry::builtin();
        let cfg = config().with_endpoint("http://localhost:8080/proxy/chat");
        let req = RequestBuilder::new(&registry).build(&history(), "x", &cfg).unwrap();
        assert_eq!(req.url.as_str(), "http://localhost:8080/proxy/chat");
    }

    #[test]
    fn test_invalid_endpoint() {
        let registry = ProviderRegistry::builtin();
        let cfg = config().with_endpoint("not a url");
        let err = RequestBuilder::new(&registry).build(&history(), "x", &cfg).unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint(_)));

        let cfg = config().with_endpoint("ftp://example.com/chat");
        let err = RequestBuilder::new(&registry).build(&history(), "x", &cfg).unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_missing_api_key() {
        let registry = ProviderRegistry::builtin();
        let cfg = RequestConfig::new("openai", "gpt-4o");
        let err = RequestBuilder::new(&registry).build(&history(), "x", &cfg).unwrap_err();
        assert!(matches!(err, Error::MissingApiKey(ref p) if p == "openai"));
    }

    #[test]
    fn test_unknown_provider_and_model() {
        let registry = ProviderRegistry::builtin();
        let builder = RequestBuilder::new(&registry);
        let err = builder
            .build(&history(), "x", &RequestConfig::new("nope", "gpt-4o").with_api_key("k"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownProvider(_)));

        let err = builder
            .build(&history(), "x", &RequestConfig::new("openai", "nope").with_api_key("k"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownModel { .. }));
    }

    #[test]
    fn test_extra_fields_merged_but_not_core_keys() {
        let registry = ProviderRegistry::builtin();
        let cfg = config()
            .with_extra("temperature", json!(0.3))
            .with_extra("model", json!("gpt-5"))
            .with_extra("stream", json!(true));
        let req = RequestBuilder::new(&registry).build(&history(), "x", &cfg).unwrap();
        assert_eq!(req.body["temperature"], json!(0.3));
        assert_eq!(req.body["model"], json!("gpt-4o-mini"));
        assert_eq!(req.body["stream"], json!(false));
    }

    #[test]
    fn test_invalid_key_characters() {
        let registry = ProviderRegistry::builtin();
        let cfg = RequestConfig::new("openai", "gpt-4o").with_api_key("bad\nkey");
        let err = RequestBuilder::new(&registry).build(&history(), "x", &cfg).unwrap_err();
        assert!(err.is_configuration());
    }
}
