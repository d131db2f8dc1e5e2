//! Live viewer session tracking.
//!
//! Every HTTP viewer gets an entry for as long as its fragmenting session
//! runs, so operators can see who is watching what.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use livemux_common::SessionId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An active viewer session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSession {
    /// Session identifier (UUID).
    pub id: String,
    /// Stream path the viewer subscribed to.
    pub stream: String,
    /// Client address, when known.
    pub client: Option<String>,
    /// Session start timestamp.
    pub started_at: DateTime<Utc>,
    /// Media fragments delivered so far.
    pub fragments: u64,
    /// Bytes delivered so far, initialization segment included.
    pub bytes: u64,
}

/// Thread-safe registry of active viewer sessions.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<DashMap<String, LiveSession>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new viewer session.
    pub fn register(&self, id: SessionId, stream: &str, client: Option<String>) {
        let key = id.to_string();
        let session = LiveSession {
            id: key.clone(),
            stream: stream.to_string(),
            client,
            started_at: Utc::now(),
            fragments: 0,
            bytes: 0,
        };

        self.sessions.insert(key, session);
        tracing::info!(
            session_id = %id,
            stream = %stream,
            "Registered live session"
        );
    }

    /// Account one delivered segment.
    pub fn record(&self, id: SessionId, is_fragment: bool, bytes: usize) {
        if let Some(mut session) = self.sessions.get_mut(&id.to_string()) {
            if is_fragment {
                session.fragments += 1;
            }
            session.bytes += bytes as u64;
        }
    }

    /// End a viewer session.
    pub fn end(&self, id: SessionId) {
        if let Some((_, session)) = self.sessions.remove(&id.to_string()) {
            tracing::info!(
                session_id = %id,
                stream = %session.stream,
                fragments = session.fragments,
                bytes = session.bytes,
                duration_secs = (Utc::now() - session.started_at).num_seconds(),
                "Ended live session"
            );
        }
    }

    pub fn get(&self, id: SessionId) -> Option<LiveSession> {
        self.sessions
            .get(&id.to_string())
            .map(|entry| entry.value().clone())
    }

    /// List all active sessions, oldest first.
    pub fn list(&self) -> Vec<LiveSession> {
        let mut sessions: Vec<LiveSession> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_end() {
        let manager = SessionManager::new();
        let id = SessionId::new();
        manager.register(id, "live/a", Some("127.0.0.1:5000".into()));
        assert_eq!(manager.len(), 1);

        let session = manager.get(id).unwrap();
        assert_eq!(session.stream, "live/a");
        assert_eq!(session.id, id.to_string());

        manager.end(id);
        assert!(manager.is_empty());
        assert!(manager.get(id).is_none());
    }

    #[test]
    fn record_counts_fragments_and_bytes() {
        let manager = SessionManager::new();
        let id = SessionId::new();
        manager.register(id, "live/a", None);

        manager.record(id, false, 700);
        manager.record(id, true, 1200);
        manager.record(id, true, 300);

        let session = manager.get(id).unwrap();
        assert_eq!(session.fragments, 2);
        assert_eq!(session.bytes, 2200);
    }

    #[test]
    fn record_on_unknown_session_is_ignored() {
        let manager = SessionManager::new();
        manager.record(SessionId::new(), true, 10);
        assert!(manager.is_empty());
    }

    #[test]
    fn list_serializes() {
        let manager = SessionManager::new();
        manager.register(SessionId::new(), "a", None);
        manager.register(SessionId::new(), "b", None);

        let json = serde_json::to_value(manager.list()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert!(json[0]["started_at"].is_string());
    }
}
