//! Business logic for chatrelay.
//!
//! Defines the session store, the `LlmProvider` port that the infrastructure
//! layer implements, and the chat relay that ties them together. Depends only
//! on `chatrelay-types` -- never on `chatrelay-infra` or any network crate.

pub mod llm;
pub mod relay;
pub mod session;
