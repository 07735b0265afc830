#![allow(dead_code)]

use clearconnect::app::AppContext;
use clearconnect::config::Config;
use clearconnect::crypto::hash_password;
use clearconnect::error::FunctionError;
use clearconnect::functions::{
    CloudFunctions, DoctorLoginRequest, DoctorLoginResponse, DoctorProfile, SendMessageRequest,
};
use clearconnect::models::{Profile, Role, Session, SessionRecord, User};
use clearconnect::session::now_millis;
use clearconnect::storage::{
    collections, decode_snapshot, insert, Query, RemoteStore, SqliteLocalStorage, SqliteStore,
};
use futures_util::future::LocalBoxFuture;
use serde_json::json;
use std::cell::Cell;
use std::sync::Arc;

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

fn rejected(status: u16, message: &str) -> FunctionError {
    FunctionError::Rejected {
        status,
        message: message.to_string(),
    }
}

/// Performs the same checks and writes as the deployed endpoints.
pub struct FakeFunctions {
    store: Arc<SqliteStore>,
    last_timestamp: Cell<i64>,
    checks_role: bool,
}

impl FakeFunctions {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        FakeFunctions {
            store,
            last_timestamp: Cell::new(0),
            checks_role: true,
        }
    }

    /// An endpoint that signs in any role and leaves the check to the client.
    pub fn without_role_check(store: Arc<SqliteStore>) -> Self {
        FakeFunctions {
            checks_role: false,
            ..FakeFunctions::new(store)
        }
    }

    /// Strictly increasing server timestamps.
    fn server_timestamp(&self) -> i64 {
        let ts = now_millis().max(self.last_timestamp.get() + 1);
        self.last_timestamp.set(ts);
        ts
    }
}

impl CloudFunctions for FakeFunctions {
    fn send_message<'a>(&'a self, request: &'a SendMessageRequest) -> LocalBoxFuture<'a, Result<(), FunctionError>> {
        Box::pin(async move {
            if request.sender_id.is_empty() || request.receiver_id.is_empty() || request.message_text.is_empty() {
                return Err(rejected(400, "Missing required fields"));
            }
            self.store
                .add(
                    collections::MESSAGES,
                    json!({
                        "senderId": request.sender_id,
                        "receiverId": request.receiver_id,
                        "messageText": request.message_text,
                        "timestamp": self.server_timestamp(),
                        "isRead": false,
                    }),
                )
                .await
                .map_err(|e| rejected(500, &e.to_string()))?;
            Ok(())
        })
    }

    fn doctor_login<'a>(
        &'a self,
        request: &'a DoctorLoginRequest,
    ) -> LocalBoxFuture<'a, Result<DoctorLoginResponse, FunctionError>> {
        Box::pin(async move {
            let query = Query::new(collections::USERS).where_eq("email", request.email.trim().to_lowercase());
            let snapshot = self
                .store
                .query(&query)
                .await
                .map_err(|e| rejected(500, &e.to_string()))?;
            let users: Vec<User> = decode_snapshot(&snapshot);
            let Some(user) = users.into_iter().next() else {
                return Err(rejected(401, "Invalid email or password"));
            };
            if user.password_hash != request.password {
                return Err(rejected(401, "Invalid email or password"));
            }
            if self.checks_role && user.role != Role::Doctor {
                return Err(rejected(403, "Only doctors can log in"));
            }

            let now = now_millis();
            let record = SessionRecord {
                user_id: user.id.clone(),
                token: request.token.clone(),
                created_at: now,
                expires_at: Some(now + WEEK_MS),
            };
            self.store
                .set(
                    collections::SESSIONS,
                    &request.session_id,
                    serde_json::to_value(&record).map_err(|e| rejected(500, &e.to_string()))?,
                )
                .await
                .map_err(|e| rejected(500, &e.to_string()))?;

            Ok(DoctorLoginResponse {
                success: true,
                user: DoctorProfile {
                    id: user.id,
                    firstname: user.firstname.trim().to_string(),
                    surname: user.surname.trim().to_string(),
                    email: user.email,
                    specialization: Some(user.specialization.unwrap_or_else(|| "Unknown".to_string())),
                    role: user.role,
                },
                expires_at: record.expires_at,
            })
        })
    }
}

pub struct Harness {
    pub ctx: AppContext,
    pub store: Arc<SqliteStore>,
    pub local: Arc<SqliteLocalStorage>,
}

pub fn harness() -> Harness {
    harness_with(FakeFunctions::new)
}

pub fn harness_with(functions: impl FnOnce(Arc<SqliteStore>) -> FakeFunctions) -> Harness {
    let store = Arc::new(SqliteStore::new(":memory:").unwrap());
    let local = Arc::new(SqliteLocalStorage::new(":memory:").unwrap());
    let functions = Arc::new(functions(store.clone()));
    let ctx = AppContext::new(store.clone(), store.clone(), functions, local.clone(), Config::default());
    Harness { ctx, store, local }
}

impl Harness {
    pub async fn seed_user(&self, firstname: &str, surname: &str, email: &str, password: &str, role: Role) -> String {
        let user = User {
            id: String::new(),
            firstname: firstname.to_string(),
            surname: surname.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password),
            role,
            dob: Some("15/06/1990".to_string()),
            gender: None,
            specialization: None,
            doctor_ids: Vec::new(),
            created_at: now_millis(),
        };
        insert(self.store.as_ref(), collections::USERS, &user).await.unwrap()
    }

    /// Writes a session record and publishes the matching local session.
    pub async fn sign_in(&self, user_id: &str, role: Role, expires_at: Option<i64>) -> Session {
        let session_id = format!("session-{}", user_id);
        let record = SessionRecord {
            user_id: user_id.to_string(),
            token: format!("token-{}", user_id),
            created_at: now_millis(),
            expires_at,
        };
        self.store
            .set(collections::SESSIONS, &session_id, serde_json::to_value(&record).unwrap())
            .await
            .unwrap();
        let session = Session {
            session_id,
            subject_id: user_id.to_string(),
            token: record.token,
            expires_at,
            role,
            profile: Profile::default(),
        };
        self.ctx.sessions.login(session.clone());
        session
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.store.query(&Query::new(collection)).await.unwrap().len()
    }
}
