//! Session lifecycle: creation, sliding expiry, and expiry sweeps.

use crate::error::HelixCoreError;
use chrono::{DateTime, Duration, Utc};
use helix_memory::MemoryStore;
use helix_protocol::SessionId;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Tracked state for one live session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent activity.
    pub last_active_at: DateTime<Utc>,
    /// Expiry deadline, slid forward on every activity.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn new(id: SessionId, expiry: Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_active_at: now,
            expires_at: now + expiry,
        }
    }

    /// Whether the session has passed its expiry deadline.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Registry of live sessions plus the per-session execution locks that
/// serialize concurrent analyses within one session.
pub struct SessionRegistry {
    sessions: parking_lot::RwLock<HashMap<SessionId, Session>>,
    locks: parking_lot::Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
    expiry: Duration,
    store: Arc<MemoryStore>,
}

impl SessionRegistry {
    /// Create a registry with the given inactivity expiry window.
    pub fn new(expiry_hours: i64, store: Arc<MemoryStore>) -> Self {
        Self {
            sessions: parking_lot::RwLock::new(HashMap::new()),
            locks: parking_lot::Mutex::new(HashMap::new()),
            expiry: Duration::hours(expiry_hours),
            store,
        }
    }

    /// Resolve a session id for a request, minting one when absent.
    ///
    /// A known unexpired session is touched, sliding its expiry forward.
    /// A known expired session is purged; unless `reuse_expired` is set
    /// the caller gets `NotFound`, otherwise a fresh session keeps the
    /// same id. An unknown id is adopted as a new session.
    pub fn get_or_create(
        &self,
        id: Option<SessionId>,
        reuse_expired: bool,
    ) -> Result<Session, HelixCoreError> {
        let id = match id {
            Some(id) => id,
            None => {
                let session = self.mint(Uuid::new_v4());
                info!("created session (session_id={})", session.id);
                return Ok(session);
            }
        };

        let existing = self.sessions.read().get(&id).cloned();
        match existing {
            Some(session) if !session.is_expired() => Ok(self.touch(id)),
            Some(_) => {
                self.purge(id)?;
                if reuse_expired {
                    info!("recreated expired session (session_id={})", id);
                    Ok(self.mint(id))
                } else {
                    warn!("rejected expired session (session_id={})", id);
                    Err(HelixCoreError::NotFound(id))
                }
            }
            None => {
                info!("adopted session (session_id={})", id);
                Ok(self.mint(id))
            }
        }
    }

    /// Look up a session without touching it.
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.read().get(&id).cloned()
    }

    /// Execution lock for a session, created on first use.
    ///
    /// Holding the lock serializes analyses within the session so commits
    /// observe a consistent memory ordering.
    pub fn lock_for(&self, id: SessionId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop expired sessions and their memory, skipping sessions with an
    /// analysis in flight. Returns the ids that were purged.
    ///
    /// Covers both tracked sessions past their deadline and persisted
    /// memory whose session is unknown to this process, which happens
    /// after a restart. The latter expire by their newest record's age.
    pub fn sweep(&self) -> Result<Vec<SessionId>, HelixCoreError> {
        let mut expired: Vec<SessionId> = self
            .sessions
            .read()
            .values()
            .filter(|session| session.is_expired())
            .map(|session| session.id)
            .collect();

        let now = Utc::now();
        for summary in self.store.list_sessions()? {
            if self.sessions.read().contains_key(&summary.session_id) {
                continue;
            }
            let stale = summary
                .last_updated
                .is_none_or(|at| at + self.expiry <= now);
            if stale {
                debug!(
                    "found stale persisted session (session_id={})",
                    summary.session_id
                );
                expired.push(summary.session_id);
            }
        }

        let mut purged = Vec::new();
        for id in expired {
            let lock = self.lock_for(id);
            let Ok(_guard) = lock.try_lock() else {
                debug!("skipped busy session during sweep (session_id={})", id);
                continue;
            };
            self.purge(id)?;
            purged.push(id);
        }
        if !purged.is_empty() {
            info!("swept expired sessions (count={})", purged.len());
        }
        Ok(purged)
    }

    /// Remove a session and cascade-delete its memory. Idempotent.
    pub fn purge(&self, id: SessionId) -> Result<(), HelixCoreError> {
        self.sessions.write().remove(&id);
        self.locks.lock().remove(&id);
        self.store.clear(id)?;
        Ok(())
    }

    /// Count tracked sessions, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no sessions are tracked.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn mint(&self, id: SessionId) -> Session {
        let session = Session::new(id, self.expiry);
        self.sessions.write().insert(id, session.clone());
        session
    }

    fn touch(&self, id: SessionId) -> Session {
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(id)
            .or_insert_with(|| Session::new(id, self.expiry));
        let now = Utc::now();
        session.last_active_at = now;
        session.expires_at = now + self.expiry;
        session.clone()
    }
}
