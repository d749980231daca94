//! Session registry
//!
//! Tracks live sessions by id. Each entry holds the shutdown signal of the
//! session's orchestrator, so a session can be stopped from outside its
//! connection.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::watch;

use retail_voice_core::Error;

struct SessionEntry {
    shutdown: watch::Sender<bool>,
    created_at: Instant,
}

/// Handle returned on registration
pub struct SessionHandle {
    pub session_id: String,
    /// Fires when the session is terminated through the registry
    pub shutdown: watch::Receiver<bool>,
}

/// Shared session registry
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Register a new session under a fresh id
    pub fn register(&self) -> Result<SessionHandle, Error> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let session_id = uuid::Uuid::new_v4().to_string();

        {
            let mut sessions = self.sessions.write();
            if sessions.len() >= self.max_sessions {
                return Err(Error::Capacity(format!(
                    "Max sessions reached ({})",
                    self.max_sessions
                )));
            }
            sessions.insert(
                session_id.clone(),
                SessionEntry {
                    shutdown: shutdown_tx,
                    created_at: Instant::now(),
                },
            );
        }

        tracing::info!(session_id = %session_id, "Registered session");
        Ok(SessionHandle {
            session_id,
            shutdown: shutdown_rx,
        })
    }

    /// Remove a session and signal its orchestrator to stop
    ///
    /// Returns false if the session was already gone.
    pub fn terminate(&self, session_id: &str) -> bool {
        let entry = self.sessions.write().remove(session_id);
        match entry {
            Some(entry) => {
                let _ = entry.shutdown.send(true);
                tracing::info!(
                    session_id = %session_id,
                    age_ms = entry.created_at.elapsed().as_millis() as u64,
                    "Removed session"
                );
                true
            }
            None => false,
        }
    }

    /// Signal every session to stop
    pub fn terminate_all(&self) -> usize {
        let drained: Vec<(String, SessionEntry)> = self.sessions.write().drain().collect();
        for (_, entry) in &drained {
            let _ = entry.shutdown.send(true);
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "Terminated all sessions");
        }
        drained.len()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn list(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }
}
