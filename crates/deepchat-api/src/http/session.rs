//! Per-client session state for the HTTP surface.
//!
//! Sessions are keyed by an opaque id handed back to the client in every
//! chat response. Each entry has its own mutex, so an exchange locks only its
//! own session while it runs.
//!
//! The map is bounded. Sessions idle for longer than the configured timeout
//! are swept periodically, and creating a session at capacity first drops
//! idle sessions, then the least recently used one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use deepchat_types::session::SessionState;

use super::error::AppError;

/// Longest client-supplied session id accepted.
pub const MAX_SESSION_ID_LEN: usize = 128;

pub type SharedSession = Arc<Mutex<SessionState>>;

struct SessionEntry {
    state: SharedSession,
    last_used: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            last_used: Instant::now(),
        }
    }
}

/// Concurrent map of session id to session state.
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Look up the session for `session_id`, creating it if absent.
    ///
    /// Without an id a fresh UUID v7 is issued. A supplied id the store has
    /// not seen (or has evicted) starts a new session under that id.
    pub fn get_or_create(&self, session_id: Option<&str>) -> Result<(String, SharedSession), AppError> {
        let id = match session_id {
            Some(id) => {
                let id = id.trim();
                if id.is_empty() || id.len() > MAX_SESSION_ID_LEN {
                    return Err(AppError::Validation(format!(
                        "session_id must be 1-{MAX_SESSION_ID_LEN} characters"
                    )));
                }
                id.to_string()
            }
            None => Uuid::now_v7().to_string(),
        };

        if let Some(mut entry) = self.sessions.get_mut(&id) {
            entry.last_used = Instant::now();
            let session = entry.state.clone();
            return Ok((id, session));
        }

        if self.sessions.len() >= self.max_sessions {
            self.evict_idle();
            if self.sessions.len() >= self.max_sessions {
                self.evict_least_recent();
            }
        }

        let session = self
            .sessions
            .entry(id.clone())
            .or_insert_with(SessionEntry::new)
            .state
            .clone();
        Ok((id, session))
    }

    /// Drop every session idle for longer than the idle timeout.
    ///
    /// Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| entry.last_used.elapsed() < self.idle_timeout);
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.sessions.len(), "evicted idle sessions");
        }
        evicted
    }

    fn evict_least_recent(&self) {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.last_used)
            .map(|entry| entry.key().clone());
        if let Some(id) = oldest {
            self.sessions.remove(&id);
            debug!(session_id = %id, "evicted least recently used session");
        }
    }

    /// Run [`SessionStore::evict_idle`] every `every` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.evict_idle();
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_new_session_gets_fresh_id() {
        let store = SessionStore::new(HOUR, 100);
        let (a, _) = store.get_or_create(None).unwrap();
        let (b, _) = store.get_or_create(None).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_same_id_returns_same_session() {
        let store = SessionStore::new(HOUR, 100);
        let (id, first) = store.get_or_create(Some("client-1")).unwrap();
        first.lock().await.start_time = Some("T1".to_string());

        let (again, second) = store.get_or_create(Some(&id)).unwrap();
        assert_eq!(again, "client-1");
        assert_eq!(second.lock().await.start_time.as_deref(), Some("T1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_rejects_blank_or_oversized_id() {
        let store = SessionStore::new(HOUR, 100);
        assert!(store.get_or_create(Some("  ")).is_err());
        assert!(store.get_or_create(Some(&"x".repeat(MAX_SESSION_ID_LEN + 1))).is_err());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_distinct_ids_never_exceed_capacity() {
        let store = SessionStore::new(HOUR, 50);
        for i in 0..500 {
            store.get_or_create(Some(&format!("client-{i}"))).unwrap();
        }
        assert_eq!(store.len(), 50);

        // The newest session is always kept.
        store.get_or_create(Some("client-499")).unwrap();
        assert_eq!(store.len(), 50);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let store = SessionStore::new(HOUR, 2);
        let (_, a) = store.get_or_create(Some("a")).unwrap();
        a.lock().await.start_time = Some("TA".to_string());
        std::thread::sleep(Duration::from_millis(2));
        store.get_or_create(Some("b")).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        // Touching "a" makes "b" the least recently used.
        store.get_or_create(Some("a")).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        store.get_or_create(Some("c")).unwrap();

        assert_eq!(store.len(), 2);
        let (_, a) = store.get_or_create(Some("a")).unwrap();
        assert_eq!(a.lock().await.start_time.as_deref(), Some("TA"));
        let (_, b) = store.get_or_create(Some("b")).unwrap();
        assert!(b.lock().await.start_time.is_none());
    }

    #[test]
    fn test_evict_idle_drops_expired_sessions() {
        let store = SessionStore::new(Duration::ZERO, 100);
        for _ in 0..3 {
            store.get_or_create(None).unwrap();
        }
        assert_eq!(store.evict_idle(), 3);
        assert_eq!(store.len(), 0);

        let store = SessionStore::new(HOUR, 100);
        store.get_or_create(None).unwrap();
        assert_eq!(store.evict_idle(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_evicts_in_background() {
        let store = Arc::new(SessionStore::new(Duration::from_millis(10), 100));
        store.get_or_create(Some("idle")).unwrap();

        let sweeper = store.clone().spawn_sweeper(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.abort();

        assert_eq!(store.len(), 0);
    }
}
