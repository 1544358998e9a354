//! In-memory session store backed by `DashMap`.
//!
//! Turns are cloned on read so no `DashMap` guard outlives a call and none is
//! ever held across an `.await`. Each session also carries an async gate; a
//! relay holds the gate for its whole invocation, which makes "at most one
//! in-flight relay per session" an enforced invariant.
//!
//! Eviction is optional: a capacity cap that drops the least-recently-used
//! idle session when a new one is created, and an idle TTL applied by
//! [`SessionStore::evict_idle`]. Sessions whose gate is held are never evicted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use chatrelay_types::chat::ChatTurn;
use chatrelay_types::config::RelayConfig;

/// Limits on the number and lifetime of stored sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvictionPolicy {
    /// Maximum live sessions; `0` disables the cap.
    pub max_sessions: usize,
    /// Sessions untouched for longer than this are removed by `evict_idle`.
    pub idle_ttl: Option<Duration>,
}

impl EvictionPolicy {
    /// No cap and no TTL: sessions live for the process lifetime.
    pub fn unbounded() -> Self {
        Self::default()
    }
}

impl From<&RelayConfig> for EvictionPolicy {
    fn from(config: &RelayConfig) -> Self {
        Self {
            max_sessions: config.max_sessions,
            idle_ttl: config.session_idle_ttl(),
        }
    }
}

/// Result of [`SessionStore::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
    /// A relay is in flight for this session.
    Busy,
}

struct SessionEntry {
    turns: Vec<ChatTurn>,
    gate: Arc<Mutex<()>>,
    last_access: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            turns: Vec::new(),
            gate: Arc::new(Mutex::new(())),
            last_access: Instant::now(),
        }
    }

    fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}

/// Process-wide mapping from session id to its ordered turns.
///
/// Cloning produces a shared view of the same underlying data (backed by `Arc`).
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<DashMap<String, SessionEntry>>,
    policy: EvictionPolicy,
}

impl SessionStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Cloned copy of the session's turns; empty if the session is unseen.
    ///
    /// Never creates the session.
    pub fn get(&self, session_id: &str) -> Vec<ChatTurn> {
        match self.inner.get_mut(session_id) {
            Some(mut entry) => {
                entry.last_access = Instant::now();
                entry.turns.clone()
            }
            None => Vec::new(),
        }
    }

    /// Overwrite the session's turns wholesale, creating it if absent.
    pub fn replace(&self, session_id: &str, turns: Vec<ChatTurn>) {
        self.with_entry(session_id, |entry| entry.turns = turns);
    }

    /// Append one turn, creating the session if absent.
    pub fn append(&self, session_id: &str, turn: ChatTurn) {
        self.with_entry(session_id, |entry| entry.turns.push(turn));
    }

    /// Get-or-create the session and return a handle to it.
    ///
    /// This is the only place a session comes into existence besides the
    /// lazy creation in `append`/`replace`.
    pub fn session(&self, session_id: &str) -> SessionHandle {
        let gate = self.with_entry(session_id, |entry| entry.gate.clone());
        SessionHandle {
            id: session_id.to_string(),
            store: self.clone(),
            gate,
        }
    }

    /// Remove a session unless a relay currently holds it.
    pub fn remove(&self, session_id: &str) -> RemoveOutcome {
        if self
            .inner
            .remove_if(session_id, |_, entry| !entry.is_busy())
            .is_some()
        {
            return RemoveOutcome::Removed;
        }
        if self.inner.contains_key(session_id) {
            RemoveOutcome::Busy
        } else {
            RemoveOutcome::NotFound
        }
    }

    fn gate_is_current(&self, session_id: &str, gate: &Arc<Mutex<()>>) -> bool {
        self.inner
            .get(session_id)
            .is_some_and(|entry| Arc::ptr_eq(&entry.gate, gate))
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.contains_key(session_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of all current session ids.
    pub fn session_ids(&self) -> Vec<String> {
        self.inner.iter().map(|r| r.key().clone()).collect()
    }

    /// Remove every idle session whose last access is older than the TTL.
    ///
    /// Returns the number of sessions removed. No-op without a TTL.
    pub fn evict_idle(&self) -> usize {
        let Some(ttl) = self.policy.idle_ttl else {
            return 0;
        };
        let before = self.inner.len();
        self.inner
            .retain(|_, entry| entry.is_busy() || entry.last_access.elapsed() <= ttl);
        let removed = before.saturating_sub(self.inner.len());
        if removed > 0 {
            debug!(removed, "Evicted idle sessions");
        }
        removed
    }

    /// Run `f` against the session's entry, creating it first if needed.
    fn with_entry<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionEntry) -> R) -> R {
        if !self.inner.contains_key(session_id) {
            self.make_room();
        }
        let mut entry = self
            .inner
            .entry(session_id.to_string())
            .or_insert_with(SessionEntry::new);
        entry.last_access = Instant::now();
        f(entry.value_mut())
    }

    /// Drop least-recently-used idle sessions until a new one fits under the cap.
    fn make_room(&self) {
        let cap = self.policy.max_sessions;
        if cap == 0 {
            return;
        }
        while self.inner.len() >= cap {
            // Pick the victim first; the iterator's shard guards must be gone
            // before `remove_if` takes a write lock.
            let victim = self
                .inner
                .iter()
                .filter(|r| !r.value().is_busy())
                .min_by_key(|r| r.value().last_access)
                .map(|r| r.key().clone());

            let Some(victim) = victim else {
                // Every session is mid-relay; allow the store to exceed the cap.
                return;
            };
            if self
                .inner
                .remove_if(&victim, |_, entry| !entry.is_busy())
                .is_some()
            {
                debug!(session_id = %victim, "Evicted least recently used session");
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(EvictionPolicy::unbounded())
    }
}

/// Handle to one session, returned by [`SessionStore::session`].
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    store: SessionStore,
    gate: Arc<Mutex<()>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cloned copy of the session's turns.
    pub fn turns(&self) -> Vec<ChatTurn> {
        self.store.get(&self.id)
    }

    /// Wait for exclusive access to the session.
    ///
    /// Concurrent callers for the same session queue here in FIFO order.
    pub async fn lock(self) -> SessionGuard {
        let mut handle = self;
        loop {
            let permit = handle.gate.clone().lock_owned().await;
            // A held gate pins the entry: eviction and `remove` skip busy sessions.
            if handle.store.gate_is_current(&handle.id, &handle.gate) {
                return SessionGuard {
                    id: handle.id,
                    store: handle.store,
                    _permit: permit,
                };
            }
            // The session was dropped while we waited; join its replacement.
            drop(permit);
            handle = handle.store.session(&handle.id);
        }
    }
}

/// Exclusive access to one session for the duration of a relay.
///
/// Dropping the guard releases the session to the next waiter.
pub struct SessionGuard {
    id: String,
    store: SessionStore,
    _permit: OwnedMutexGuard<()>,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cloned copy of the session's turns, oldest first.
    pub fn history(&self) -> Vec<ChatTurn> {
        self.store.get(&self.id)
    }

    pub fn append(&self, turn: ChatTurn) {
        self.store.append(&self.id, turn);
    }

    /// Append `turn`, then keep only the newest `max_turns` turns.
    ///
    /// Returns the number of turns retained.
    pub fn append_and_truncate(&self, turn: ChatTurn, max_turns: usize) -> usize {
        self.store.with_entry(&self.id, |entry| {
            entry.turns.push(turn);
            truncate_to_recent(&mut entry.turns, max_turns);
            entry.turns.len()
        })
    }
}

/// Drop the oldest turns so at most `max_turns` remain, preserving order.
pub fn truncate_to_recent(turns: &mut Vec<ChatTurn>, max_turns: usize) {
    if turns.len() > max_turns {
        let excess = turns.len() - max_turns;
        turns.drain(..excess);
    }
}
