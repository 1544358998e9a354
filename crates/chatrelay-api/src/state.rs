//! Application state shared by the CLI commands and HTTP handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use chatrelay_core::llm::box_provider::BoxLlmProvider;
use chatrelay_core::relay::{ChatRelay, RelaySettings};
use chatrelay_core::session::{EvictionPolicy, SessionStore};
use chatrelay_infra::llm::create_provider;
use chatrelay_infra::secret::api_key_from_env;
use chatrelay_types::config::RelayConfig;

/// Shared state behind every handler.
///
/// Cheap to clone: everything lives behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ChatRelay>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    /// Wire the store, provider, and relay from configuration.
    ///
    /// The provider API key is read from the environment here, so a missing
    /// key fails startup instead of the first chat request.
    pub fn init(config: RelayConfig, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let provider = build_provider(&config)?;
        Ok(Self::with_provider(config, provider, shutdown))
    }

    /// Wire the state around an already-built provider.
    pub fn with_provider(
        config: RelayConfig,
        provider: BoxLlmProvider,
        shutdown: CancellationToken,
    ) -> Self {
        let store = SessionStore::new(EvictionPolicy::from(&config));
        let relay = ChatRelay::new(store, Arc::new(provider), RelaySettings::from(&config))
            .with_shutdown(shutdown);

        Self {
            relay: Arc::new(relay),
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &SessionStore {
        self.relay.store()
    }
}

/// Build the configured provider, reading its key from the environment.
pub fn build_provider(config: &RelayConfig) -> anyhow::Result<BoxLlmProvider> {
    let api_key = api_key_from_env(&config.provider.api_key_env)?;
    Ok(create_provider(&config.provider, api_key)?)
}
