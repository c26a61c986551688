//! Chat session: runs one streamed turn at a time against a conversation.

use std::sync::Arc;

use futures::StreamExt;
use natter_ai::{
    Error as AiError, Message, ProviderRegistry, RequestBuilder, RequestConfig, SseDecoder,
    SseEvent, SseState, StreamEvent, StreamEventStream, Transport, TransportResponse,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::error::Result;
use crate::handle::{InFlight, SessionHandle};

/// Capacity of the per-turn event channel
const EVENT_BUFFER: usize = 64;

/// Capacity of the observer broadcast channel
const OBSERVER_BUFFER: usize = 256;

/// A conversation bound to a provider configuration.
///
/// Each [`send`](ChatSession::send) runs on its own task and reports through
/// a fresh event stream. History only changes when a turn completes: the
/// user message and the assistant reply are appended together.
pub struct ChatSession {
    registry: Arc<ProviderRegistry>,
    transport: Arc<dyn Transport>,
    config: Mutex<RequestConfig>,
    conversation: Arc<Mutex<Conversation>>,
    event_tx: broadcast::Sender<StreamEvent>,
    handle: SessionHandle,
}

impl ChatSession {
    /// Create a session with an empty conversation.
    ///
    /// Fails if the provider, model or endpoint in `config` is unusable.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        transport: Arc<dyn Transport>,
        system_prompt: impl Into<String>,
        config: RequestConfig,
    ) -> Result<Self> {
        Self::with_conversation(registry, transport, Conversation::new(system_prompt), config)
    }

    /// Create a session that continues an existing conversation
    pub fn with_conversation(
        registry: Arc<ProviderRegistry>,
        transport: Arc<dyn Transport>,
        conversation: Conversation,
        config: RequestConfig,
    ) -> Result<Self> {
        validate(&registry, &config)?;
        let (event_tx, _) = broadcast::channel(OBSERVER_BUFFER);
        Ok(Self {
            registry,
            transport,
            config: Mutex::new(config),
            conversation: Arc::new(Mutex::new(conversation)),
            event_tx,
            handle: SessionHandle::new(),
        })
    }

    /// Switch provider, model or overrides.
    ///
    /// On error the previous configuration stays active. A request already
    /// in flight keeps the configuration it started with.
    pub fn configure(&self, config: RequestConfig) -> Result<()> {
        validate(&self.registry, &config)?;
        tracing::debug!(provider = %config.provider_id, model = %config.model_id, "Session reconfigured");
        *self.config.lock() = config;
        Ok(())
    }

    /// Current configuration
    pub fn config(&self) -> RequestConfig {
        self.config.lock().clone()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Snapshot of the history, system prompt first
    pub fn messages(&self) -> Vec<Message> {
        self.conversation.lock().messages().to_vec()
    }

    /// Snapshot of the whole conversation
    pub fn conversation(&self) -> Conversation {
        self.conversation.lock().clone()
    }

    /// Observe events of every turn this session runs.
    ///
    /// Rejected sends (see [`send`](ChatSession::send)) are only reported to
    /// their own stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.event_tx.subscribe()
    }

    /// Get a cloneable handle for cancelling from other tasks
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Cancel the in-flight turn, if any
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Run one conversational turn.
    ///
    /// Must be called from within a Tokio runtime. While another turn is in
    /// flight the returned stream yields `Started` followed by
    /// `Failed(RequestInFlight)` and the running turn is left alone.
    pub fn send(&self, text: impl Into<String>) -> StreamEventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        match self.handle.begin() {
            Some((cancel, in_flight)) => {
                let id = Uuid::new_v4();
                let turn = Turn {
                    user: Message::user(text),
                    config: self.config(),
                    registry: Arc::clone(&self.registry),
                    transport: Arc::clone(&self.transport),
                    conversation: Arc::clone(&self.conversation),
                    observers: self.event_tx.clone(),
                    tx,
                    cancel,
                    in_flight,
                };
                tokio::spawn(turn.run().instrument(tracing::debug_span!("turn", %id)));
            }
            None => {
                tracing::warn!("Rejecting send: a request is already in flight");
                let _ = tx.try_send(StreamEvent::Started);
                let _ = tx.try_send(StreamEvent::from(AiError::RequestInFlight));
            }
        }

        Box::pin(ReceiverStream::new(rx))
    }
}

fn validate(registry: &ProviderRegistry, config: &RequestConfig) -> natter_ai::Result<()> {
    let provider = registry.resolve(&config.provider_id)?;
    registry.model_for(provider, &config.model_id)?;
    let endpoint = config
        .endpoint_override
        .as_deref()
        .unwrap_or(&provider.base_url);
    natter_ai::request::parse_endpoint(endpoint)?;
    Ok(())
}

/// Everything one spawned turn needs
struct Turn {
    user: Message,
    config: RequestConfig,
    registry: Arc<ProviderRegistry>,
    transport: Arc<dyn Transport>,
    conversation: Arc<Mutex<Conversation>>,
    observers: broadcast::Sender<StreamEvent>,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    in_flight: InFlight,
}

impl Turn {
    async fn run(mut self) {
        let outcome = match self.emit(StreamEvent::Started).await {
            Ok(()) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(AiError::Cancelled),
                    _ = self.tx.closed() => Err(AiError::Cancelled),
                    result = self.drive() => result,
                }
            }
            Err(e) => Err(e),
        };

        let terminal = match outcome {
            Ok(_) if self.tx.is_closed() => {
                tracing::debug!("Caller went away before completion");
                StreamEvent::Cancelled
            }
            Ok(text) => {
                self.conversation
                    .lock()
                    .commit_turn(self.user.clone(), Message::assistant(text.as_str()));
                tracing::debug!(chars = text.len(), "Turn committed");
                StreamEvent::Completed { text }
            }
            Err(AiError::Cancelled) => {
                tracing::debug!("Turn cancelled");
                StreamEvent::Cancelled
            }
            Err(e) => {
                tracing::debug!("Turn failed: {}", e);
                StreamEvent::from(e)
            }
        };

        // Free the session before the caller sees the terminal event.
        self.in_flight.release();
        let _ = self.emit(terminal).await;
    }

    async fn drive(&self) -> natter_ai::Result<String> {
        let request = {
            let conversation = self.conversation.lock();
            RequestBuilder::new(&self.registry).build(
                conversation.messages(),
                &self.user.content,
                &self.config,
            )?
        };

        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            return Err(response.into_error().await);
        }

        if self.config.streaming {
            self.read_stream(response).await
        } else {
            let body = response.bytes().await?;
            self.registry.resolve(&self.config.provider_id)?.decode(&body)
        }
    }

    async fn read_stream(&self, mut response: TransportResponse) -> natter_ai::Result<String> {
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = response.body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    decoder.abort();
                    return Err(e);
                }
            };
            for event in decoder.feed(&chunk) {
                if let SseEvent::Delta { text, fragment } = event {
                    self.emit(StreamEvent::Delta { text, fragment }).await?;
                }
            }
            if decoder.state() == SseState::Done {
                break;
            }
        }

        decoder.finish()
    }

    /// Deliver an event to observers and to the caller's stream.
    /// Fails with `Cancelled` once the caller has dropped the stream.
    async fn emit(&self, event: StreamEvent) -> natter_ai::Result<()> {
        let _ = self.observers.send(event.clone());
        self.tx.send(event).await.map_err(|_| AiError::Cancelled)
    }
}
