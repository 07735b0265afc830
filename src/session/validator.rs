use super::now_millis;
use super::store::SessionStore;
use crate::error::StoreError;
use crate::models::{Session, SessionRecord};
use crate::storage::{collections, fetch, RemoteStore};
use log::{error, warn};
use std::cell::Cell;
use std::fmt;

/// Outcome of comparing a local session against its server record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCheck {
    Valid,
    Missing,
    TokenMismatch,
    Expired,
}

impl fmt::Display for RecordCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordCheck::Valid => write!(f, "session is valid"),
            RecordCheck::Missing => write!(f, "session record not found"),
            RecordCheck::TokenMismatch => write!(f, "session token mismatch"),
            RecordCheck::Expired => write!(f, "session expired"),
        }
    }
}

impl RecordCheck {
    /// Checks, in order: the record exists, the tokens agree, the expiry
    /// has not passed. A record without an expiry never expires.
    pub fn evaluate(session: &Session, record: Option<&SessionRecord>, now: i64) -> Self {
        let Some(record) = record else {
            return RecordCheck::Missing;
        };
        if record.token != session.token {
            return RecordCheck::TokenMismatch;
        }
        match record.expires_at {
            Some(expires_at) if now > expires_at => RecordCheck::Expired,
            _ => RecordCheck::Valid,
        }
    }
}

pub async fn check_record(store: &dyn RemoteStore, session: &Session) -> Result<RecordCheck, StoreError> {
    let record: Option<SessionRecord> = fetch(store, collections::SESSIONS, &session.session_id).await?;
    Ok(RecordCheck::evaluate(session, record.as_ref(), now_millis()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Validating,
    Valid,
    Invalid,
}

/// Per-screen gate run on every focus event.
pub struct SessionValidator {
    sessions: SessionStore,
    state: Cell<Validation>,
}

impl SessionValidator {
    pub fn new(sessions: SessionStore) -> Self {
        SessionValidator {
            sessions,
            state: Cell::new(Validation::Validating),
        }
    }

    pub fn state(&self) -> Validation {
        self.state.get()
    }

    pub async fn validate(&self) -> Validation {
        self.state.set(Validation::Validating);
        let outcome = match self.sessions.current() {
            None => Validation::Invalid,
            Some(session) => match check_record(self.sessions.remote(), &session).await {
                Ok(RecordCheck::Valid) => Validation::Valid,
                Ok(failure) => {
                    warn!("[SessionValidator] Logging out {}: {}", session.subject_id, failure);
                    self.sessions.logout().await;
                    Validation::Invalid
                }
                Err(e) => {
                    error!("[SessionValidator] Session check failed: {}", e);
                    Validation::Invalid
                }
            },
        };
        self.state.set(outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Profile, Role};

    fn session() -> Session {
        Session {
            session_id: "s1".to_string(),
            subject_id: "u1".to_string(),
            token: "tok".to_string(),
            expires_at: None,
            role: Role::Doctor,
            profile: Profile::default(),
        }
    }

    fn record(token: &str, expires_at: Option<i64>) -> SessionRecord {
        SessionRecord {
            user_id: "u1".to_string(),
            token: token.to_string(),
            created_at: 0,
            expires_at,
        }
    }

    #[test]
    fn test_evaluate_order_of_checks() {
        let s = session();
        assert_eq!(RecordCheck::evaluate(&s, None, 100), RecordCheck::Missing);
        assert_eq!(
            RecordCheck::evaluate(&s, Some(&record("x", Some(1))), 100),
            RecordCheck::TokenMismatch
        );
        assert_eq!(
            RecordCheck::evaluate(&s, Some(&record("tok", Some(99))), 100),
            RecordCheck::Expired
        );
        assert_eq!(
            RecordCheck::evaluate(&s, Some(&record("tok", Some(100))), 100),
            RecordCheck::Valid
        );
        assert_eq!(
            RecordCheck::evaluate(&s, Some(&record("tok", None)), 100),
            RecordCheck::Valid
        );
    }
}
