//! In-memory chat session store with time-based expiry.

use crate::chat::types::ChatMessage;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Upper bound on retained history entries per session; oldest entries are
/// dropped first.
const MAX_HISTORY: usize = 50;

/// A single server-side conversational context.
#[derive(Debug, Clone)]
pub struct ChatSession {
    /// Opaque session identifier.
    pub id: String,
    /// Vector collection this session converses against.
    pub collection_name: String,
    /// Bounded history, most recent last.
    pub chat_history: Vec<ChatMessage>,
    /// Unix timestamp captured at creation, for reporting.
    pub created_at: i64,
    /// Total messages ever appended (not capped by history trimming).
    pub message_count: u64,
    last_accessed: Instant,
}

/// Aggregate counters over the registry, computed by a full scan.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SessionStats {
    /// Sessions whose `last_accessed` falls within the timeout window.
    pub active_sessions: usize,
    /// All sessions currently held, expired-but-unswept included.
    pub total_sessions: usize,
    /// Sum of `message_count` across active sessions.
    pub total_messages: u64,
    /// Configured timeout in hours.
    pub session_timeout_hours: u64,
}

struct SessionMap {
    sessions: HashMap<String, ChatSession>,
    last_sweep: Instant,
}

/// Thread-safe session registry guarded by one coarse lock.
///
/// Expiry is lazy: `get` removes an expired entry on lookup, and every `get`
/// opportunistically runs a full sweep once the sweep interval has elapsed.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<SessionMap>>,
    timeout: Duration,
    sweep_interval: Duration,
}

impl SessionRegistry {
    /// Create a registry expiring sessions after `timeout_hours` of inactivity,
    /// sweeping at most once per hour.
    pub fn new(timeout_hours: u64) -> Self {
        Self::with_timings(
            Duration::from_secs(timeout_hours * 3600),
            Duration::from_secs(3600),
        )
    }

    /// Create a registry with explicit timeout and sweep interval.
    pub fn with_timings(timeout: Duration, sweep_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionMap {
                sessions: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            timeout,
            sweep_interval,
        }
    }

    /// Configured timeout in whole hours, as exposed by [`SessionRegistry::stats`].
    pub fn timeout_hours(&self) -> u64 {
        self.timeout.as_secs() / 3600
    }

    /// Insert a fresh session for `collection_name` and return its identifier.
    pub fn create(&self, collection_name: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = ChatSession {
            id: session_id.clone(),
            collection_name: collection_name.to_string(),
            chat_history: Vec::new(),
            created_at: time::OffsetDateTime::now_utc().unix_timestamp(),
            message_count: 0,
            last_accessed: Instant::now(),
        };
        let mut map = self.lock();
        map.sessions.insert(session_id.clone(), session);
        tracing::info!(session_id = %session_id, collection = collection_name, "Created session");
        session_id
    }

    /// Fetch a session, refreshing its `last_accessed` stamp.
    ///
    /// Expired sessions are removed and reported as absent. When more than the
    /// sweep interval has elapsed since the last sweep, all expired sessions
    /// are purged before the lookup.
    pub fn get(&self, session_id: &str) -> Option<ChatSession> {
        if session_id.is_empty() {
            return None;
        }
        let now = Instant::now();
        let mut map = self.lock();

        if now.duration_since(map.last_sweep) > self.sweep_interval {
            self.sweep_locked(&mut map, now);
        }

        let expired = match map.sessions.get(session_id) {
            Some(session) => now.duration_since(session.last_accessed) > self.timeout,
            None => return None,
        };
        if expired {
            tracing::info!(session_id, "Session expired, removing");
            map.sessions.remove(session_id);
            return None;
        }

        let session = map
            .sessions
            .get_mut(session_id)
            .expect("session present after expiry check");
        session.last_accessed = now;
        Some(session.clone())
    }

    /// Append a message to a session's history, trimming to the most recent
    /// [`MAX_HISTORY`] entries. Returns `false` when the session is unknown.
    pub fn append_message(&self, session_id: &str, message: ChatMessage) -> bool {
        if session_id.is_empty() {
            return false;
        }
        let mut map = self.lock();
        let Some(session) = map.sessions.get_mut(session_id) else {
            return false;
        };
        session.chat_history.push(message);
        session.message_count += 1;
        session.last_accessed = Instant::now();
        if session.chat_history.len() > MAX_HISTORY {
            let excess = session.chat_history.len() - MAX_HISTORY;
            session.chat_history.drain(..excess);
        }
        tracing::debug!(
            session_id,
            total_messages = session.message_count,
            "Appended message to session"
        );
        true
    }

    /// Remove a session. Returns `true` when an entry was deleted.
    pub fn delete(&self, session_id: &str) -> bool {
        let removed = self.lock().sessions.remove(session_id).is_some();
        if removed {
            tracing::info!(session_id, "Deleted session");
        }
        removed
    }

    /// Compute registry-wide counters with a full scan under the lock.
    pub fn stats(&self) -> SessionStats {
        let now = Instant::now();
        let map = self.lock();
        let mut active_sessions = 0;
        let mut total_messages = 0;
        for session in map.sessions.values() {
            if now.duration_since(session.last_accessed) <= self.timeout {
                active_sessions += 1;
                total_messages += session.message_count;
            }
        }
        SessionStats {
            active_sessions,
            total_sessions: map.sessions.len(),
            total_messages,
            session_timeout_hours: self.timeout_hours(),
        }
    }

    fn sweep_locked(&self, map: &mut SessionMap, now: Instant) {
        let before = map.sessions.len();
        map.sessions
            .retain(|_, session| now.duration_since(session.last_accessed) <= self.timeout);
        let purged = before - map.sessions.len();
        if purged > 0 {
            tracing::info!(purged, "Swept expired sessions");
        }
        map.last_sweep = now;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionMap> {
        self.inner.lock().expect("session registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::{ChatMessage, ChatRole};

    fn message(content: &str) -> ChatMessage {
        ChatMessage {
            role: ChatRole::User,
            content: content.to_string(),
            sources: None,
        }
    }

    #[test]
    fn create_and_get_round_trip() {
        let registry = SessionRegistry::new(24);
        let id = registry.create("physics-7");
        let session = registry.get(&id).expect("session present");
        assert_eq!(session.collection_name, "physics-7");
        assert!(session.chat_history.is_empty());
        assert_eq!(session.message_count, 0);
    }

    #[test]
    fn get_unknown_or_empty_id_is_none() {
        let registry = SessionRegistry::new(24);
        assert!(registry.get("no-such-session").is_none());
        assert!(registry.get("").is_none());
    }

    #[test]
    fn append_fails_for_unknown_session() {
        let registry = SessionRegistry::new(24);
        assert!(!registry.append_message("missing", message("hi")));
    }

    #[test]
    fn history_is_capped_at_fifty_keeping_most_recent() {
        let registry = SessionRegistry::new(24);
        let id = registry.create("chemistry-6");
        for i in 0..75 {
            assert!(registry.append_message(&id, message(&format!("m{i}"))));
        }
        let session = registry.get(&id).expect("session present");
        assert_eq!(session.chat_history.len(), 50);
        assert_eq!(session.message_count, 75);
        // oldest dropped first, order preserved
        assert_eq!(session.chat_history[0].content, "m25");
        assert_eq!(session.chat_history[49].content, "m74");
    }

    #[test]
    fn history_shorter_than_cap_is_untouched() {
        let registry = SessionRegistry::new(24);
        let id = registry.create("biology-8");
        for i in 0..3 {
            registry.append_message(&id, message(&format!("m{i}")));
        }
        let session = registry.get(&id).expect("session present");
        assert_eq!(session.chat_history.len(), 3);
        let contents: Vec<_> = session
            .chat_history
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["m0", "m1", "m2"]);
    }

    #[test]
    fn expired_session_is_unreachable() {
        let registry =
            SessionRegistry::with_timings(Duration::from_millis(0), Duration::from_secs(3600));
        let id = registry.create("physics-7");
        std::thread::sleep(Duration::from_millis(5));
        assert!(registry.get(&id).is_none());
        // removal is permanent
        assert!(!registry.delete(&id));
    }

    #[test]
    fn session_is_reachable_before_timeout() {
        let registry =
            SessionRegistry::with_timings(Duration::from_secs(3600), Duration::from_secs(3600));
        let id = registry.create("physics-7");
        std::thread::sleep(Duration::from_millis(5));
        assert!(registry.get(&id).is_some());
    }

    #[test]
    fn sweep_purges_expired_sessions_on_get() {
        let registry =
            SessionRegistry::with_timings(Duration::from_millis(0), Duration::from_millis(0));
        let stale = registry.create("physics-7");
        std::thread::sleep(Duration::from_millis(5));
        // lookup of a different id triggers the sweep that removes `stale`
        assert!(registry.get("other").is_none());
        assert_eq!(registry.stats().total_sessions, 0);
        let _ = stale;
    }

    #[test]
    fn stats_counts_active_sessions_and_messages() {
        let registry = SessionRegistry::new(24);
        let a = registry.create("physics-7");
        let _b = registry.create("chemistry-6");
        registry.append_message(&a, message("hello"));
        registry.append_message(&a, message("again"));

        let stats = registry.stats();
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.session_timeout_hours, 24);
    }

    #[test]
    fn delete_reports_presence() {
        let registry = SessionRegistry::new(24);
        let id = registry.create("physics-7");
        assert!(registry.delete(&id));
        assert!(!registry.delete(&id));
    }
}
