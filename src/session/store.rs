use super::validator::{check_record, RecordCheck};
use crate::error::{AppError, AuthError};
use crate::models::Session;
use crate::navigation::{Navigator, Route};
use crate::storage::{collections, LocalStorage, RemoteStore};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;

/// Device storage key holding the serialized session.
pub const SESSION_KEY: &str = "userSession";

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Startup, before `restore` has finished.
    Restoring,
    LoggedOut,
    LoggedIn(Session),
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::LoggedIn(session) => Some(session),
            _ => None,
        }
    }
}

/// Holds the signed-in identity for the whole application.
///
/// Clones share state. Every change is published on a watch channel so
/// mounted screens observe logins and forced logouts.
#[derive(Clone)]
pub struct SessionStore {
    remote: Arc<dyn RemoteStore>,
    local: Arc<dyn LocalStorage>,
    navigator: Navigator,
    state: Arc<watch::Sender<AuthState>>,
}

impl SessionStore {
    pub fn new(remote: Arc<dyn RemoteStore>, local: Arc<dyn LocalStorage>, navigator: Navigator) -> Self {
        let (state, _) = watch::channel(AuthState::Restoring);
        SessionStore {
            remote,
            local,
            navigator,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn require(&self) -> Result<Session, AppError> {
        self.current().ok_or(AppError::Auth(AuthError::NotSignedIn))
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Loads the persisted session. Anything unreadable, incomplete or
    /// rejected by the server record leaves the app logged out.
    pub async fn restore(&self) -> AuthState {
        let raw = match self.local.get_item(SESSION_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                error!("[SessionStore] Failed to read stored session: {}", e);
                None
            }
        };
        let Some(raw) = raw else {
            return self.publish(AuthState::LoggedOut);
        };

        let session = match serde_json::from_str::<Session>(&raw) {
            Ok(session) if !session.subject_id.is_empty() && !session.token.is_empty() => session,
            Ok(_) => {
                warn!("[SessionStore] Stored session is missing its id or token");
                self.forget_local();
                return self.publish(AuthState::LoggedOut);
            }
            Err(e) => {
                warn!("[SessionStore] Stored session is unreadable: {}", e);
                self.forget_local();
                return self.publish(AuthState::LoggedOut);
            }
        };

        match check_record(self.remote(), &session).await {
            Ok(RecordCheck::Valid) => {
                info!("[SessionStore] Restored session for {}", session.subject_id);
                self.publish(AuthState::LoggedIn(session))
            }
            Ok(failure) => {
                info!("[SessionStore] Discarding stored session: {}", failure);
                self.forget_local();
                self.publish(AuthState::LoggedOut)
            }
            Err(e) => {
                error!("[SessionStore] Could not verify stored session: {}", e);
                self.publish(AuthState::LoggedOut)
            }
        }
    }

    /// Persists and publishes a freshly created session.
    pub fn login(&self, session: Session) {
        match serde_json::to_string(&session) {
            Ok(raw) => {
                if let Err(e) = self.local.set_item(SESSION_KEY, &raw) {
                    error!("[SessionStore] Failed to persist session: {}", e);
                }
            }
            Err(e) => error!("[SessionStore] Failed to serialize session: {}", e),
        }
        info!("[SessionStore] {} signed in as {}", session.subject_id, session.role);
        self.publish(AuthState::LoggedIn(session));
    }

    /// Ends the session everywhere. The remote delete is attempted once and
    /// its failure only logged; local state is always cleared.
    pub async fn logout(&self) {
        if let Some(session) = self.current() {
            if let Err(e) = self.remote.delete(collections::SESSIONS, &session.session_id).await {
                error!(
                    "[SessionStore] Failed to delete remote session {}: {}",
                    session.session_id, e
                );
            }
        }
        self.forget_local();
        self.publish(AuthState::LoggedOut);
        self.navigator.reset(Route::Home);
    }

    fn forget_local(&self) {
        if let Err(e) = self.local.remove_item(SESSION_KEY) {
            error!("[SessionStore] Failed to clear stored session: {}", e);
        }
    }

    fn publish(&self, state: AuthState) -> AuthState {
        self.state.send_replace(state.clone());
        state
    }
}
