//! Owner of the persisted session pair (`auth_token`, `user_data`) and of the
//! in-memory session. Nothing else in the crate touches those keys.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::models::{Session, UserProfile};
use crate::storage::{KeyValueStore, StorageError};

pub const TOKEN_KEY: &str = "auth_token";
pub const PROFILE_KEY: &str = "user_data";

/// Session lifecycle notifications for the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn { subject_id: String },
    SignedOut,
    /// The backend rejected the bearer token. Hosts should route to sign-in.
    Invalidated { reason: String },
}

/// What `CredentialVault::load` found in storage.
#[derive(Debug)]
pub enum StoredSession {
    Missing,
    Present(Session),
    /// Token or profile present without the other, or a profile that does not parse.
    Corrupt(String),
}

pub struct CredentialVault {
    storage: Arc<dyn KeyValueStore>,
    current: watch::Sender<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl CredentialVault {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        let (current, _) = watch::channel(None);
        let (events, _) = broadcast::channel(16);
        Self {
            storage,
            current,
            events,
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|s| s.token.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn load(&self) -> Result<StoredSession, StorageError> {
        let token = self.storage.get(TOKEN_KEY)?;
        let profile = self.storage.get(PROFILE_KEY)?;

        match (token, profile) {
            (None, None) => Ok(StoredSession::Missing),
            (Some(token), Some(raw)) => match serde_json::from_str::<UserProfile>(&raw) {
                Ok(profile) => Ok(StoredSession::Present(Session::new(profile, token))),
                Err(e) => Ok(StoredSession::Corrupt(format!("invalid profile: {}", e))),
            },
            (Some(_), None) => Ok(StoredSession::Corrupt("token without profile".to_string())),
            (None, Some(_)) => Ok(StoredSession::Corrupt("profile without token".to_string())),
        }
    }

    /// Persist the pair in one write, then publish it in memory.
    pub fn store(&self, session: Session) -> Result<(), StorageError> {
        let profile = serde_json::to_string(session.profile())?;
        self.storage
            .set_many(&[(TOKEN_KEY, session.token.clone()), (PROFILE_KEY, profile)])?;

        let subject_id = session.subject_id.clone();
        self.current.send_replace(Some(session));
        let _ = self.events.send(SessionEvent::SignedIn { subject_id });
        Ok(())
    }

    /// Publish a session in memory only (the optimistic restore phase).
    pub fn adopt(&self, session: Session) {
        self.current.send_replace(Some(session));
    }

    /// Remove both keys and drop the in-memory session.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove_many(&[TOKEN_KEY, PROFILE_KEY]) {
            tracing::error!(error = %e, "Failed to clear persisted session");
        }
        let had_session = self.current.send_replace(None).is_some();
        if had_session {
            let _ = self.events.send(SessionEvent::SignedOut);
        }
    }

    /// Tear the session down because the backend rejected the token.
    pub fn invalidate(&self, reason: impl Into<String>) {
        if let Err(e) = self.storage.remove_many(&[TOKEN_KEY, PROFILE_KEY]) {
            tracing::error!(error = %e, "Failed to clear persisted session");
        }
        let had_session = self.current.send_replace(None).is_some();
        if had_session {
            let reason = reason.into();
            tracing::warn!(reason = %reason, "Session invalidated");
            let _ = self.events.send(SessionEvent::Invalidated { reason });
        }
    }
}
