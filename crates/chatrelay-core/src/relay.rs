//! Chat relay: one inbound message in, one streamed assistant reply out.
//!
//! `ChatRelay::send_message` validates the message, takes the session's lock,
//! assembles `[system] + history + [user]`, and waits for the provider to
//! accept the request. Only then is the user turn recorded and a
//! [`ReplyStream`] handed back. A spawned producer task forwards text
//! fragments through a bounded channel (backpressure: the producer suspends
//! while the consumer has not drained the buffer) and, when the provider
//! reports completion, appends the assistant turn and truncates the session.
//!
//! If the consumer drops the stream, the producer stops, drops the provider
//! stream, and records nothing further. The session lock is released when
//! the producer exits.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use chatrelay_types::chat::ChatTurn;
use chatrelay_types::config::RelayConfig;
use chatrelay_types::error::RelayError;
use chatrelay_types::llm::{CompletionRequest, LlmError, Message, StreamEvent};

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::EventStream;
use crate::session::store::{SessionGuard, SessionStore};

/// Fixed per-process relay settings. Callers never influence these.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub system_prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub max_turns: usize,
    pub fallback_session_id: String,
    pub stream_buffer: usize,
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            model: config.provider.model.clone(),
            max_tokens: config.provider.max_tokens,
            temperature: config.provider.temperature,
            max_turns: config.max_turns,
            fallback_session_id: config.fallback_session_id.clone(),
            stream_buffer: config.stream_buffer,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

/// One inbound message.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub message: String,
    pub session_id: Option<String>,
}

impl RelayRequest {
    pub fn new(message: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            session_id,
        }
    }
}

/// How a producer task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Provider signalled completion; the assistant turn was recorded.
    Completed,
    /// The consumer went away before completion.
    Disconnected,
    /// The relay was shut down.
    Cancelled,
    /// The provider failed or ended the stream without completing.
    Failed,
}

/// Build the provider request for `user_message` on top of `history`.
///
/// The system instruction travels in `system`; `messages` holds the stored
/// history oldest first followed by the new user message.
pub fn build_completion_request(
    settings: &RelaySettings,
    history: &[ChatTurn],
    user_message: &str,
) -> CompletionRequest {
    let mut messages: Vec<Message> = history.iter().cloned().map(Message::from).collect();
    messages.push(ChatTurn::user(user_message).into());

    CompletionRequest {
        model: settings.model.clone(),
        messages,
        system: Some(settings.system_prompt.clone()),
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
        stream: true,
    }
}

/// Bridges inbound messages to a streaming provider and keeps session history.
pub struct ChatRelay {
    store: SessionStore,
    provider: Arc<BoxLlmProvider>,
    settings: RelaySettings,
    shutdown: CancellationToken,
}

impl ChatRelay {
    pub fn new(store: SessionStore, provider: Arc<BoxLlmProvider>, settings: RelaySettings) -> Self {
        Self {
            store,
            provider,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `token` to cancel in-flight relays (e.g., on server shutdown).
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Relay one message and return the live reply stream.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidMessage`] if the message is empty; nothing is stored.
    /// - [`RelayError::Provider`] if the provider rejects the request before
    ///   streaming; nothing is stored.
    /// - [`RelayError::Cancelled`] if the relay shuts down while waiting.
    pub async fn send_message(&self, request: RelayRequest) -> Result<ReplyStream, RelayError> {
        if request.message.is_empty() {
            return Err(RelayError::InvalidMessage);
        }

        let session_id = match request.session_id {
            Some(id) => id,
            None => {
                debug!(
                    session_id = %self.settings.fallback_session_id,
                    "No session id supplied, using the shared fallback session"
                );
                self.settings.fallback_session_id.clone()
            }
        };

        let relay_id = Uuid::now_v7();
        let span = info_span!("relay", %relay_id, session_id = %session_id);

        let (guard, events, pending) = self
            .dispatch(&session_id, &request.message)
            .instrument(span.clone())
            .await?;

        guard.append(ChatTurn::user(request.message));

        let (tx, rx) = mpsc::channel(self.settings.stream_buffer.max(1));
        let max_turns = self.settings.max_turns;
        let shutdown = self.shutdown.child_token();

        tokio::spawn(
            async move {
                let outcome = pump(guard, events, pending, tx, max_turns, shutdown).await;
                debug!(?outcome, "Relay finished");
            }
            .instrument(span),
        );

        Ok(ReplyStream {
            session_id,
            inner: ReceiverStream::new(rx),
        })
    }

    /// Lock the session, send the request, and wait for the provider's first event.
    async fn dispatch(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<(SessionGuard, EventStream, Option<StreamEvent>), RelayError> {
        let guard = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(RelayError::Cancelled),
            guard = self.store.session(session_id).lock() => guard,
        };

        let history = guard.history();
        let request = build_completion_request(&self.settings, &history, message);
        debug!(
            history_turns = history.len(),
            model = %request.model,
            provider = self.provider.name(),
            "Dispatching completion request"
        );

        let mut events = self.provider.stream(request);
        let first = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(RelayError::Cancelled),
            first = events.next() => first,
        };

        let pending = match first {
            Some(Ok(StreamEvent::Connected)) => None,
            Some(Ok(event)) => Some(event),
            Some(Err(e)) => {
                warn!(error = %e, "Provider rejected the request");
                return Err(RelayError::Provider(e));
            }
            None => {
                warn!("Provider closed the stream before responding");
                return Err(RelayError::Provider(LlmError::Stream(
                    "provider closed the stream before responding".to_string(),
                )));
            }
        };

        Ok((guard, events, pending))
    }
}

/// Drive the provider stream into the channel and commit on completion.
///
/// The guard is held until this returns, so the next relay for the session
/// observes the committed history.
async fn pump(
    guard: SessionGuard,
    mut events: EventStream,
    pending: Option<StreamEvent>,
    tx: mpsc::Sender<String>,
    max_turns: usize,
    shutdown: CancellationToken,
) -> RelayOutcome {
    let mut full_response = String::new();
    let mut fragments: usize = 0;
    let mut next = pending.map(Ok);

    loop {
        let event = match next.take() {
            Some(event) => Some(event),
            None => tokio::select! {
                biased;
                _ = shutdown.cancelled() => return RelayOutcome::Cancelled,
                _ = tx.closed() => {
                    debug!(fragments, "Consumer disconnected, dropping provider stream");
                    return RelayOutcome::Disconnected;
                }
                event = events.next() => event,
            },
        };

        match event {
            Some(Ok(StreamEvent::TextDelta { text })) => {
                if text.is_empty() {
                    continue;
                }
                full_response.push_str(&text);
                fragments += 1;

                let sent = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return RelayOutcome::Cancelled,
                    sent = tx.send(text) => sent,
                };
                if sent.is_err() {
                    debug!(fragments, "Consumer disconnected, dropping provider stream");
                    return RelayOutcome::Disconnected;
                }
            }
            Some(Ok(StreamEvent::MessageDelta { stop_reason })) => {
                debug!(%stop_reason, "Provider stop reason");
            }
            Some(Ok(StreamEvent::Usage(usage))) => {
                debug!(
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "Provider usage"
                );
            }
            Some(Ok(StreamEvent::Connected)) => {}
            Some(Ok(StreamEvent::Done)) => break,
            Some(Err(e)) => {
                warn!(error = %e, fragments, "Provider stream failed mid-response");
                return RelayOutcome::Failed;
            }
            None => {
                warn!(fragments, "Provider stream ended without completing");
                return RelayOutcome::Failed;
            }
        }
    }

    let chars = full_response.len();
    let retained = guard.append_and_truncate(ChatTurn::assistant(full_response), max_turns);
    info!(fragments, chars, retained, "Assistant reply recorded");
    RelayOutcome::Completed
}

/// Live, finite, non-restartable stream of assistant text fragments.
pub struct ReplyStream {
    session_id: String,
    inner: ReceiverStream<String>,
}

impl ReplyStream {
    /// The session this reply belongs to (after fallback resolution).
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Stream for ReplyStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use chatrelay_types::llm::{
        CompletionResponse, MessageRole, ProviderCapabilities, StopReason, Usage,
    };

    use crate::llm::provider::LlmProvider;

    // --- Mock provider ---

    #[derive(Clone)]
    enum Script {
        /// Connected, each fragment, Done.
        Reply(Vec<String>),
        /// Error as the first item.
        Reject,
        /// Connected, fragments, then an error.
        FailAfter(Vec<String>),
        /// Connected, fragments, then the stream just ends.
        Truncated(Vec<String>),
        /// Connected, then pending forever.
        Hang,
    }

    struct MockProvider {
        capabilities: ProviderCapabilities,
        script: Script,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl MockProvider {
        fn new(script: Script) -> Self {
            Self {
                capabilities: ProviderCapabilities {
                    streaming: true,
                    max_context_tokens: 10_000,
                    max_output_tokens: 1_000,
                },
                script,
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn capabilities(&self) -> &ProviderCapabilities {
            &self.capabilities
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                id: "mock".to_string(),
                content: String::new(),
                model: "mock".to_string(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            })
        }

        fn stream(&self, request: CompletionRequest) -> EventStream {
            self.requests.lock().unwrap().push(request);
            let script = self.script.clone();
            Box::pin(async_stream::stream! {
                match script {
                    Script::Reply(fragments) => {
                        yield Ok(StreamEvent::Connected);
                        for text in fragments {
                            yield Ok(StreamEvent::TextDelta { text });
                        }
                        yield Ok(StreamEvent::MessageDelta { stop_reason: StopReason::EndTurn });
                        yield Ok(StreamEvent::Done);
                    }
                    Script::Reject => {
                        yield Err(LlmError::AuthenticationFailed);
                    }
                    Script::FailAfter(fragments) => {
                        yield Ok(StreamEvent::Connected);
                        for text in fragments {
                            yield Ok(StreamEvent::TextDelta { text });
                        }
                        yield Err(LlmError::Stream("connection reset".to_string()));
                    }
                    Script::Truncated(fragments) => {
                        yield Ok(StreamEvent::Connected);
                        for text in fragments {
                            yield Ok(StreamEvent::TextDelta { text });
                        }
                    }
                    Script::Hang => {
                        yield Ok(StreamEvent::Connected);
                        futures_util::future::pending::<()>().await;
                    }
                }
            })
        }
    }

    fn relay_with(script: Script) -> (ChatRelay, Arc<Mutex<Vec<CompletionRequest>>>) {
        let provider = MockProvider::new(script);
        let requests = provider.requests.clone();
        let relay = ChatRelay::new(
            SessionStore::default(),
            Arc::new(BoxLlmProvider::new(provider)),
            RelaySettings::default(),
        );
        (relay, requests)
    }

    fn reply(fragments: &[&str]) -> Script {
        Script::Reply(fragments.iter().map(|s| s.to_string()).collect())
    }

    async fn collect(stream: ReplyStream) -> Vec<String> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_streams_fragments_in_order_and_records_exchange() {
        let (relay, _) = relay_with(reply(&["Hel", "lo", " there"]));

        let stream = relay
            .send_message(RelayRequest::new("hi", Some("s1".to_string())))
            .await
            .unwrap();
        assert_eq!(stream.session_id(), "s1");

        let fragments = collect(stream).await;
        assert_eq!(fragments, vec!["Hel", "lo", " there"]);

        let turns = relay.store().get("s1");
        assert_eq!(
            turns,
            vec![ChatTurn::user("hi"), ChatTurn::assistant("Hello there")]
        );
    }

    #[tokio::test]
    async fn test_persisted_reply_equals_concatenated_fragments() {
        let (relay, _) = relay_with(reply(&["a", "", "b", "c\n", "ü"]));
        let stream = relay
            .send_message(RelayRequest::new("go", Some("s".to_string())))
            .await
            .unwrap();
        let joined: String = collect(stream).await.concat();
        let turns = relay.store().get("s");
        assert_eq!(turns.last().unwrap().content, joined);
        assert_eq!(joined, "abc\nü");
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_without_side_effects() {
        let (relay, requests) = relay_with(reply(&["x"]));
        relay.store().append("s", ChatTurn::user("earlier"));

        let err = relay
            .send_message(RelayRequest::new("", Some("s".to_string())))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::InvalidMessage));
        assert_eq!(relay.store().get("s"), vec![ChatTurn::user("earlier")]);
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_is_system_then_history_then_new_message() {
        let (relay, requests) = relay_with(reply(&["ok"]));
        relay.store().replace(
            "s",
            vec![
                ChatTurn::user("u1"),
                ChatTurn::assistant("a1"),
                ChatTurn::user("u2"),
            ],
        );

        let stream = relay
            .send_message(RelayRequest::new("u3", Some("s".to_string())))
            .await
            .unwrap();
        collect(stream).await;

        let sent = requests.lock().unwrap()[0].clone();
        let prompt: Vec<(MessageRole, String)> = sent
            .prompt_messages()
            .into_iter()
            .map(|m| (m.role, m.content))
            .collect();
        assert_eq!(
            prompt,
            vec![
                (MessageRole::System, "You are a helpful assistant.".to_string()),
                (MessageRole::User, "u1".to_string()),
                (MessageRole::Assistant, "a1".to_string()),
                (MessageRole::User, "u2".to_string()),
                (MessageRole::User, "u3".to_string()),
            ]
        );
        assert_eq!(sent.model, "gemini-2.5-flash");
        assert!(sent.stream);
    }

    #[tokio::test]
    async fn test_absent_session_id_uses_shared_fallback() {
        let (relay, _) = relay_with(reply(&["r"]));

        let first = relay
            .send_message(RelayRequest::new("from caller one", None))
            .await
            .unwrap();
        assert_eq!(first.session_id(), "default");
        collect(first).await;

        let second = relay
            .send_message(RelayRequest::new("from caller two", None))
            .await
            .unwrap();
        collect(second).await;

        let turns = relay.store().get("default");
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0], ChatTurn::user("from caller one"));
        assert_eq!(turns[2], ChatTurn::user("from caller two"));
    }

    #[tokio::test]
    async fn test_history_is_capped_after_each_completion() {
        let (relay, _) = relay_with(reply(&["reply"]));

        for i in 0..20 {
            let stream = relay
                .send_message(RelayRequest::new(format!("m{i}"), Some("s".to_string())))
                .await
                .unwrap();
            collect(stream).await;

            let turns = relay.store().get("s");
            let appended = 2 * (i + 1);
            assert_eq!(turns.len(), appended.min(30));
        }

        let turns = relay.store().get("s");
        // 40 turns appended; the newest 30 start at user message m5.
        assert_eq!(turns.first(), Some(&ChatTurn::user("m5")));
        assert_eq!(turns[28], ChatTurn::user("m19"));
        assert_eq!(turns.last(), Some(&ChatTurn::assistant("reply")));
    }

    #[tokio::test]
    async fn test_provider_rejection_returns_error_and_stores_nothing() {
        let (relay, _) = relay_with(Script::Reject);
        let err = relay
            .send_message(RelayRequest::new("hi", Some("s".to_string())))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RelayError::Provider(LlmError::AuthenticationFailed)
        ));
        assert!(relay.store().get("s").is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_user_turn_only() {
        let (relay, _) = relay_with(Script::FailAfter(vec!["part".to_string()]));
        let stream = relay
            .send_message(RelayRequest::new("hi", Some("s".to_string())))
            .await
            .unwrap();
        assert_eq!(collect(stream).await, vec!["part"]);
        assert_eq!(relay.store().get("s"), vec![ChatTurn::user("hi")]);
    }

    #[tokio::test]
    async fn test_stream_ending_without_done_is_not_recorded() {
        let (relay, _) = relay_with(Script::Truncated(vec!["half".to_string()]));
        let stream = relay
            .send_message(RelayRequest::new("hi", Some("s".to_string())))
            .await
            .unwrap();
        collect(stream).await;
        assert_eq!(relay.store().get("s"), vec![ChatTurn::user("hi")]);
    }

    #[tokio::test]
    async fn test_dropping_the_stream_discards_partial_reply() {
        let fragments: Vec<String> = (0..10).map(|i| format!("f{i}")).collect();
        let (relay, _) = relay_with(Script::Reply(fragments));

        let mut stream = relay
            .send_message(RelayRequest::new("hi", Some("s".to_string())))
            .await
            .unwrap();
        assert_eq!(stream.next().await.as_deref(), Some("f0"));
        drop(stream);

        // Acquiring the lock waits for the producer to exit.
        let guard = relay.store().session("s").lock().await;
        assert_eq!(guard.history(), vec![ChatTurn::user("hi")]);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_relay() {
        let token = CancellationToken::new();
        let provider = MockProvider::new(Script::Hang);
        let relay = ChatRelay::new(
            SessionStore::default(),
            Arc::new(BoxLlmProvider::new(provider)),
            RelaySettings::default(),
        )
        .with_shutdown(token.clone());

        let stream = relay
            .send_message(RelayRequest::new("hi", Some("s".to_string())))
            .await
            .unwrap();
        token.cancel();

        let fragments = tokio::time::timeout(Duration::from_secs(1), collect(stream))
            .await
            .unwrap();
        assert!(fragments.is_empty());
        assert_eq!(relay.store().get("s"), vec![ChatTurn::user("hi")]);

        let err = relay
            .send_message(RelayRequest::new("again", Some("s".to_string())))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::Cancelled));
    }

    #[tokio::test]
    async fn test_concurrent_relays_on_one_session_do_not_interleave() {
        let (relay, requests) = relay_with(reply(&["x", "y"]));
        let relay = Arc::new(relay);

        let mut tasks = Vec::new();
        for i in 0..8 {
            let relay = relay.clone();
            tasks.push(tokio::spawn(async move {
                let stream = relay
                    .send_message(RelayRequest::new(format!("q{i}"), Some("s".to_string())))
                    .await
                    .unwrap();
                stream.collect::<Vec<_>>().await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), vec!["x", "y"]);
        }

        let turns = relay.store().get("s");
        assert_eq!(turns.len(), 16);
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, MessageRole::User);
            assert_eq!(pair[1], ChatTurn::assistant("xy"));
        }

        // Each dispatch saw a history of complete pairs.
        let requests = requests.lock().unwrap();
        for request in requests.iter() {
            assert_eq!(request.messages.len() % 2, 1);
        }
    }

    #[tokio::test]
    async fn test_different_sessions_stream_independently() {
        let (relay, _) = relay_with(Script::Hang);
        let _held = relay
            .send_message(RelayRequest::new("hi", Some("a".to_string())))
            .await
            .unwrap();

        let other = tokio::time::timeout(
            Duration::from_secs(1),
            relay.send_message(RelayRequest::new("hi", Some("b".to_string()))),
        )
        .await;
        assert!(other.is_ok());
    }

    #[test]
    fn test_settings_follow_config() {
        let mut config = RelayConfig::default();
        config.system_prompt = "custom".to_string();
        config.max_turns = 12;
        config.provider.model = "gpt-4o-mini".to_string();
        let settings = RelaySettings::from(&config);
        assert_eq!(settings.system_prompt, "custom");
        assert_eq!(settings.max_turns, 12);
        assert_eq!(settings.model, "gpt-4o-mini");
    }

    #[test]
    fn test_build_request_appends_user_message_last() {
        let settings = RelaySettings::default();
        let history = vec![ChatTurn::user("a"), ChatTurn::assistant("b")];
        let request = build_completion_request(&settings, &history, "c");
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[2].role, MessageRole::User);
        assert_eq!(request.messages[2].content, "c");
        assert_eq!(request.system.as_deref(), Some("You are a helpful assistant."));
    }
}
