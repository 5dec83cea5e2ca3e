//! OAuth session context for CSRF protection.
//!
//! An [`OAuthSession`] carries the one state token issued for an interactive
//! authorization attempt. It is passed explicitly into the connector; nothing
//! here is global. [`SessionStore`] keeps sessions between the redirect and
//! the callback when the flow is driven over HTTP.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Default lifetime of an issued state token (10 minutes).
pub const DEFAULT_STATE_EXPIRY_SECONDS: i64 = 600;

/// Why a callback's state was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("callback carries no state parameter")]
    Missing,

    #[error("no authorization is pending for this session")]
    NotPending,

    #[error("state parameter does not match the issued state")]
    Mismatch,

    #[error("issued state has expired")]
    Expired,
}

#[derive(Clone, Debug)]
struct PendingState {
    token: String,
    created_at: DateTime<Utc>,
}

/// Per-attempt authorization state.
#[derive(Clone, Debug)]
pub struct OAuthSession {
    pending: Option<PendingState>,
    expiry_duration: Duration,
}

impl Default for OAuthSession {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_EXPIRY_SECONDS)
    }
}

impl OAuthSession {
    /// Create an empty session whose state tokens live for `expiry_seconds`.
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            pending: None,
            expiry_duration: Duration::try_seconds(expiry_seconds)
                .unwrap_or_else(Duration::max_value),
        }
    }

    /// Record a freshly issued state token, replacing any earlier one.
    pub fn begin(&mut self, token: String) {
        self.pending = Some(PendingState {
            token,
            created_at: Utc::now(),
        });
    }

    /// The state token currently awaiting its callback.
    pub fn pending_state(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.token.as_str())
    }

    pub fn is_awaiting_callback(&self) -> bool {
        self.pending.is_some()
    }

    /// Discard any pending state.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Validate the state returned by the provider and consume the pending one.
    ///
    /// The pending state is cleared whatever the outcome.
    pub fn validate_and_consume(&mut self, returned: Option<&str>) -> Result<(), StateError> {
        let pending = self.pending.take().ok_or(StateError::NotPending)?;
        let returned = returned.ok_or(StateError::Missing)?;

        if returned != pending.token {
            return Err(StateError::Mismatch);
        }

        if Utc::now() - pending.created_at > self.expiry_duration {
            return Err(StateError::Expired);
        }

        Ok(())
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match &self.pending {
            Some(p) => now - p.created_at > self.expiry_duration,
            None => true,
        }
    }
}

/// Sessions awaiting their callback, keyed by an opaque session id.
pub struct SessionStore {
    sessions: DashMap<String, OAuthSession>,
    expiry_seconds: i64,
}

impl SessionStore {
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            expiry_seconds,
        }
    }

    /// Take the session for `id` out of the store.
    ///
    /// Unknown or absent ids get a new, empty session and a new id. The
    /// session must be handed back with [`SessionStore::checkin`].
    pub fn checkout(&self, id: Option<&str>) -> (String, OAuthSession) {
        if let Some(id) = id {
            if let Some((id, session)) = self.sessions.remove(id) {
                return (id, session);
            }
        }
        (Uuid::new_v4().to_string(), OAuthSession::new(self.expiry_seconds))
    }

    /// Return a session to the store. Sessions with nothing pending are dropped.
    pub fn checkin(&self, id: String, session: OAuthSession) {
        if session.is_awaiting_callback() {
            self.sessions.insert(id, session);
        }
    }

    /// Drop sessions whose state has expired.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.sessions.retain(|_, session| !session.is_stale(now));
    }

    /// Number of sessions awaiting a callback
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

/// Background task to periodically clean up expired sessions
pub async fn run_session_cleanup(store: Arc<SessionStore>, interval_seconds: u64) {
    let period = tokio::time::Duration::from_secs(interval_seconds.max(1));
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;
        store.cleanup_expired();
        tracing::debug!("OAuth session cleanup complete, {} sessions remaining", store.count());
    }
}
