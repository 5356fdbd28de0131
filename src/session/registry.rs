use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::state::SessionState;
use super::stats::SessionStats;

/// Live sessions keyed by connection ID
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<SessionState>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, state: Arc<SessionState>) {
        let session_id = state.session_id().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), state);
        info!("Session {} registered ({} active)", session_id, sessions.len());
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<SessionState>> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(session_id);
        if removed.is_some() {
            info!("Session {} removed ({} active)", session_id, sessions.len());
        }
        removed
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionState>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Stats for every live session, ordered by start time
    pub async fn all_stats(&self) -> Vec<SessionStats> {
        let sessions: Vec<Arc<SessionState>> = self.sessions.read().await.values().cloned().collect();

        let mut stats = Vec::with_capacity(sessions.len());
        for session in sessions {
            stats.push(session.stats().await);
        }
        stats.sort_by_key(|s| s.started_at);
        stats
    }
}
