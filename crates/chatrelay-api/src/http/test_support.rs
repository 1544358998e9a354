//! Shared fixtures for handler tests: a scripted provider and an app builder.

use std::path::Path;

use axum::Router;
use axum::body::to_bytes;
use axum::response::Response;
use tokio_util::sync::CancellationToken;

use chatrelay_core::llm::box_provider::BoxLlmProvider;
use chatrelay_core::llm::provider::{EventStream, LlmProvider};
use chatrelay_types::config::RelayConfig;
use chatrelay_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason,
    StreamEvent, Usage,
};

use crate::http::router::build_router;
use crate::state::AppState;

/// What the mock provider does for every request.
#[derive(Clone)]
pub enum Script {
    /// Connected, each fragment, Done.
    Reply(Vec<String>),
    /// Fails before connecting.
    Reject,
}

pub struct MockProvider {
    script: Script,
    capabilities: ProviderCapabilities,
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match &self.script {
            Script::Reply(parts) => Ok(CompletionResponse {
                id: "mock-1".to_string(),
                content: parts.concat(),
                model: "mock-model".to_string(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            }),
            Script::Reject => Err(LlmError::AuthenticationFailed),
        }
    }

    fn stream(&self, _request: CompletionRequest) -> EventStream {
        let script = self.script.clone();
        Box::pin(async_stream::stream! {
            match script {
                Script::Reply(parts) => {
                    yield Ok(StreamEvent::Connected);
                    for text in parts {
                        yield Ok(StreamEvent::TextDelta { text });
                    }
                    yield Ok(StreamEvent::Done);
                }
                Script::Reject => {
                    yield Err(LlmError::AuthenticationFailed);
                }
            }
        })
    }
}

fn build(script: Script, config: RelayConfig) -> (Router, AppState) {
    let provider = BoxLlmProvider::new(MockProvider {
        script,
        capabilities: ProviderCapabilities {
            streaming: true,
            max_context_tokens: 1_000,
            max_output_tokens: 100,
        },
    });
    let state = AppState::with_provider(config, provider, CancellationToken::new());
    (build_router(state.clone()), state)
}

/// Router plus state around a scripted provider, with no static files.
pub fn test_app(script: Script) -> (Router, AppState) {
    build(
        script,
        RelayConfig {
            web_dir: "/nonexistent/chatrelay-web".to_string(),
            ..Default::default()
        },
    )
}

/// Same as [`test_app`] but serving static files from `web_dir`.
pub fn test_app_with_web_dir(script: Script, web_dir: &Path) -> (Router, AppState) {
    build(
        script,
        RelayConfig {
            web_dir: web_dir.display().to_string(),
            ..Default::default()
        },
    )
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
