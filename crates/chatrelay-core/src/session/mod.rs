//! Per-session conversation history.
//!
//! The [`store::SessionStore`] owns every session's turns for the lifetime of
//! the process. A [`store::SessionHandle`] is the get-or-create entry point,
//! and its lock is the serialization point for relays on that session.
//! [`sweeper`] evicts sessions idle past the configured TTL.

pub mod store;
pub mod sweeper;

pub use store::{EvictionPolicy, RemoveOutcome, SessionGuard, SessionHandle, SessionStore};
pub use sweeper::{spawn_idle_sweeper, sweep_interval};
