//! Session storage
//!
//! Holds live dashboard sessions in memory. Nothing is persisted. Sessions
//! idle past the TTL are dropped, and the store never grows past its cap.

use super::{AnalysisSession, SessionSnapshot};
use crate::error::PropvestError;
use crate::models::{ExpensesUpdate, FinancingAssumptions, FinancingUpdate, OperatingExpenses};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Trait for session storage
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(
        &self,
        assumptions: Option<FinancingAssumptions>,
        expenses: Option<OperatingExpenses>,
    ) -> Result<SessionSnapshot>;
    async fn get(&self, session_id: Uuid) -> Result<SessionSnapshot>;
    async fn update_assumptions(&self, session_id: Uuid, update: FinancingUpdate) -> Result<SessionSnapshot>;
    async fn update_expenses(&self, session_id: Uuid, update: ExpensesUpdate) -> Result<SessionSnapshot>;
    async fn remove(&self, session_id: Uuid) -> Result<()>;
    async fn list(&self) -> Result<Vec<Uuid>>;
}

/// Bounds on how many sessions the in-memory store keeps alive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions untouched for longer than this are dropped
    pub ttl: Duration,
    /// Creating beyond this evicts the least recently used session
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            max_sessions: 1000,
        }
    }
}

struct StoredSession {
    session: AnalysisSession,
    last_seen: DateTime<Utc>,
    touched: u64,
}

#[derive(Default)]
struct Sessions {
    entries: HashMap<Uuid, StoredSession>,
    clock: u64,
}

impl Sessions {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Live entry for `session_id`, refreshed; an expired one is dropped
    fn live(&mut self, session_id: Uuid, ttl: Duration, now: DateTime<Utc>) -> Result<&mut StoredSession> {
        let expired = match self.entries.get(&session_id) {
            Some(entry) => is_expired(entry, ttl, now),
            None => return Err(PropvestError::SessionNotFound(session_id)),
        };
        if expired {
            self.entries.remove(&session_id);
            debug!(session_id = %session_id, "Session expired on access");
            return Err(PropvestError::SessionNotFound(session_id));
        }

        let touched = self.tick();
        let entry = self
            .entries
            .get_mut(&session_id)
            .ok_or(PropvestError::SessionNotFound(session_id))?;
        entry.last_seen = now;
        entry.touched = touched;
        Ok(entry)
    }

    fn evict_expired(&mut self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !is_expired(entry, ttl, now));
        before - self.entries.len()
    }

    fn evict_least_recent(&mut self) -> Option<Uuid> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.touched)
            .map(|(id, _)| *id)?;
        self.entries.remove(&oldest);
        Some(oldest)
    }
}

fn is_expired(entry: &StoredSession, ttl: Duration, now: DateTime<Utc>) -> bool {
    // A clock step backwards counts as no idle time
    let idle = (now - entry.last_seen).to_std().unwrap_or_default();
    idle > ttl
}

/// In-memory session store with idle expiry and a size cap
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<Sessions>>,
    limits: SessionLimits,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_limits(SessionLimits::default())
    }

    pub fn with_limits(limits: SessionLimits) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(Sessions::default())),
            limits: SessionLimits {
                max_sessions: limits.max_sessions.max(1),
                ..limits
            },
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Drop every session idle longer than the TTL as of `now`
    pub async fn evict_idle_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let evicted = sessions.evict_expired(self.limits.ttl, now);
        if evicted > 0 {
            info!(evicted, remaining = sessions.entries.len(), "Evicted idle sessions");
        }
        evicted
    }

    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Utc::now()).await
    }

    /// Sweep idle sessions every `period` until the task is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                store.evict_idle().await;
            }
        })
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {

    async fn create(
        &self,
        assumptions: Option<FinancingAssumptions>,
        expenses: Option<OperatingExpenses>,
    ) -> Result<SessionSnapshot> {
        let session = match (assumptions, expenses) {
            (None, None) => AnalysisSession::new()?,
            (a, e) => AnalysisSession::with_inputs(a.unwrap_or_default(), e.unwrap_or_default())?,
        };
        let snapshot = session.snapshot();
        let now = Utc::now();

        let mut sessions = self.sessions.write().await;
        sessions.evict_expired(self.limits.ttl, now);
        while sessions.entries.len() >= self.limits.max_sessions {
            match sessions.evict_least_recent() {
                Some(evicted) => warn!(session_id = %evicted, "Session cap reached, evicting least recently used"),
                None => break,
            }
        }

        let touched = sessions.tick();
        sessions.entries.insert(
            session.id(),
            StoredSession {
                session,
                last_seen: now,
                touched,
            },
        );

        info!(session_id = %snapshot.session_id, "Session created");
        Ok(snapshot)
    }

    async fn get(&self, session_id: Uuid) -> Result<SessionSnapshot> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.live(session_id, self.limits.ttl, Utc::now())?;
        Ok(entry.session.snapshot())
    }

    async fn update_assumptions(&self, session_id: Uuid, update: FinancingUpdate) -> Result<SessionSnapshot> {
        // Write lock spans read, recompute and swap so concurrent edits serialize
        let mut sessions = self.sessions.write().await;
        let entry = sessions.live(session_id, self.limits.ttl, Utc::now())?;

        entry.session.update_assumptions(&update)?;
        Ok(entry.session.snapshot())
    }

    async fn update_expenses(&self, session_id: Uuid, update: ExpensesUpdate) -> Result<SessionSnapshot> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.live(session_id, self.limits.ttl, Utc::now())?;

        entry.session.update_expenses(&update)?;
        Ok(entry.session.snapshot())
    }

    async fn remove(&self, session_id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entries
            .remove(&session_id)
            .map(|_| ())
            .ok_or(PropvestError::SessionNotFound(session_id))
    }

    async fn list(&self) -> Result<Vec<Uuid>> {
        let sessions = self.sessions.read().await;
        let now = Utc::now();

        let mut items: Vec<_> = sessions
            .entries
            .values()
            .filter(|entry| !is_expired(entry, self.limits.ttl, now))
            .map(|entry| (entry.session.id(), entry.session.created_at))
            .collect();

        items.sort_by_key(|(_, created_at)| *created_at);

        Ok(items.into_iter().map(|(id, _)| id).collect())
    }
}
