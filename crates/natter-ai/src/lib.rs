//! natter-ai: chat-completion provider layer
//!
//! This crate holds everything needed to talk to an OpenAI-style
//! chat-completions endpoint: the provider registry, per-provider response
//! decoders, the request builder, the incremental SSE decoder and the HTTP
//! transport.

pub mod error;
pub mod providers;
pub mod registry;
pub mod request;
pub mod sse;
pub mod stream;
pub mod transport;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use providers::{ProviderDescriptor, ResponseDecoder};
pub use registry::ProviderRegistry;
pub use request::{ChatRequest, RequestBuilder};
pub use sse::{SseDecoder, SseEvent, SseState};
pub use stream::{StreamEvent, StreamEventStream};
pub use transport::{ByteStream, HttpTransport, Transport, TransportResponse};
pub use types::*;
