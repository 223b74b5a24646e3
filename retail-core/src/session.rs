//! Session store: sign-in, registration, sign-out and two-phase restore.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ApiResponse};
use crate::credentials::{CredentialVault, SessionEvent, StoredSession};
use crate::models::{Credentials, LoginResponse, Registration, Session};
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    RegistrationRejected(String),

    #[error("Session revalidation failed: {0}")]
    RevalidationFailed(String),

    #[error("{0}")]
    Transport(String),

    #[error("Malformed auth response: {0}")]
    MalformedResponse(String),

    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Deserialize)]
struct AuthStatus {
    #[serde(default)]
    authenticated: Option<bool>,
}

pub struct SessionStore {
    api: Arc<ApiClient>,
    vault: Arc<CredentialVault>,
}

impl SessionStore {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let vault = api.vault().clone();
        Self { api, vault }
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn current(&self) -> Option<Session> {
        self.vault.current()
    }

    pub fn is_signed_in(&self) -> bool {
        self.vault.current().is_some()
    }

    /// Reactive view of the current session.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.vault.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.vault.events()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self.api.login(&credentials).await;
        if !response.success {
            return Err(login_failure(&response));
        }

        let login = response.decode::<LoginResponse>();
        if !login.success {
            return Err(AuthError::MalformedResponse(login.error_or("Login failed")));
        }
        let LoginResponse { token, user } = login
            .data
            .ok_or_else(|| AuthError::MalformedResponse("missing login payload".to_string()))?;

        let session = Session::new(user, token);
        self.vault.store(session.clone())?;

        tracing::info!(subject_id = %session.subject_id, "Signed in");
        Ok(session)
    }

    /// Register, then sign in with the same credentials.
    pub async fn register(&self, registration: Registration) -> Result<Session, AuthError> {
        let response = self.api.register(&registration).await;
        if !response.success {
            let message = response.error_or("Registration failed");
            tracing::warn!(email = %registration.email, error = %message, "Registration rejected");
            return Err(AuthError::RegistrationRejected(message));
        }

        tracing::info!(email = %registration.email, "Registered, signing in");
        self.sign_in(&registration.email, &registration.password).await
    }

    /// Notify the backend (failure ignored), then drop all local session state.
    pub async fn sign_out(&self) {
        if self.vault.token().is_some() {
            let response = self.api.logout().await;
            if !response.success {
                tracing::warn!(error = ?response.error, "Logout notification failed");
            }
        }
        self.vault.clear();
        tracing::info!("Signed out");
    }

    /// Optimistic phase: publish the cached session without asking the backend.
    /// Corrupt or half-written cache entries are cleared.
    pub fn restore_cached(&self) -> Option<Session> {
        match self.vault.load() {
            Ok(StoredSession::Present(session)) => {
                self.vault.adopt(session.clone());
                Some(session)
            }
            Ok(StoredSession::Missing) => None,
            Ok(StoredSession::Corrupt(reason)) => {
                tracing::warn!(reason = %reason, "Discarding cached session");
                self.vault.clear();
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read cached session");
                self.vault.clear();
                None
            }
        }
    }

    /// Verification phase. Any failure, network errors included, signs out.
    pub async fn revalidate(&self) -> Result<(), AuthError> {
        if self.vault.token().is_none() {
            return Err(AuthError::RevalidationFailed("no session".to_string()));
        }

        let response = self.api.auth_status().await;
        let verdict = if !response.success {
            Err(response.error_or("Auth status check failed"))
        } else {
            match response.decode::<AuthStatus>().data {
                Some(AuthStatus {
                    authenticated: Some(false),
                }) => Err("token not recognised".to_string()),
                _ => Ok(()),
            }
        };

        verdict.map_err(|reason| {
            tracing::warn!(reason = %reason, "Cached session rejected, signing out");
            self.vault.clear();
            AuthError::RevalidationFailed(reason)
        })
    }

    /// Both restore phases, awaited.
    pub async fn restore_session(&self) -> Option<Session> {
        self.restore_cached()?;
        match self.revalidate().await {
            Ok(()) => self.vault.current(),
            Err(_) => None,
        }
    }

    /// Optimistic phase now; verification on a spawned task that may later
    /// downgrade the session.
    pub fn spawn_restore(self: &Arc<Self>) -> (Option<Session>, Option<JoinHandle<()>>) {
        let cached = self.restore_cached();
        if cached.is_none() {
            return (None, None);
        }

        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _ = store.revalidate().await;
        });
        (cached, Some(handle))
    }
}

fn login_failure(response: &ApiResponse) -> AuthError {
    let message = response.error_or("Login failed");
    match response.status {
        Some(400) | Some(401) | Some(403) => AuthError::InvalidCredentials(message),
        _ => AuthError::Transport(message),
    }
}
