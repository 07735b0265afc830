//! Session lifecycle: the device-persisted store and the focus-time validator.

mod store;
mod validator;

pub use store::{AuthState, SessionStore, SESSION_KEY};
pub use validator::{check_record, RecordCheck, SessionValidator, Validation};

use crate::crypto::Crypto;
use crate::error::AppError;
use crate::models::SessionRecord;
use crate::storage::{collections, RemoteStore};
use chrono::{Duration, Utc};
use uuid::Uuid;

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Identifiers of a freshly minted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub session_id: String,
    pub token: String,
}

impl SessionTicket {
    pub fn mint(crypto: &Crypto) -> Result<Self, AppError> {
        Ok(SessionTicket {
            session_id: Uuid::new_v4().simple().to_string(),
            token: crypto.session_token()?,
        })
    }
}

/// Writes the server-side record for a new session of `user_id`.
pub async fn create_session(
    store: &dyn RemoteStore,
    crypto: &Crypto,
    user_id: &str,
    ttl: Duration,
) -> Result<(SessionTicket, SessionRecord), AppError> {
    let ticket = SessionTicket::mint(crypto)?;
    let now = now_millis();
    let record = SessionRecord {
        user_id: user_id.to_string(),
        token: ticket.token.clone(),
        created_at: now,
        expires_at: Some(now + ttl.num_milliseconds()),
    };
    store
        .set(
            collections::SESSIONS,
            &ticket.session_id,
            serde_json::to_value(&record).map_err(crate::error::StoreError::from)?,
        )
        .await?;
    Ok((ticket, record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{fetch, SqliteStore};

    #[tokio::test]
    async fn test_create_session_writes_record() {
        let store = SqliteStore::new(":memory:").unwrap();
        let (ticket, record) = create_session(&store, &Crypto::new(), "u1", Duration::days(7))
            .await
            .unwrap();

        let stored: SessionRecord = fetch(&store, collections::SESSIONS, &ticket.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, record);
        assert_eq!(stored.token, ticket.token);
        let ttl = stored.expires_at.unwrap() - stored.created_at;
        assert_eq!(ttl, Duration::days(7).num_milliseconds());
    }
}
