//! Remote document store, blob storage and device storage seams.
//!
//! The managed backend is consumed through [`RemoteStore`] and [`BlobStore`];
//! [`SqliteStore`] implements both in-process. Device storage lives behind
//! [`LocalStorage`].

mod live;
mod local;
mod query;
mod sqlite;

pub use live::{ListenerRegistry, LiveQuery, Registration, SharedRegistry, Snapshot};
pub use local::{LocalStorage, SqliteLocalStorage};
pub use query::{Direction, Filter, Query};
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use futures_util::future::LocalBoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub mod collections {
    pub const USERS: &str = "users";
    pub const SESSIONS: &str = "sessions";
    pub const APPOINTMENTS: &str = "appointments";
    pub const MESSAGES: &str = "messages";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const READINGS: &str = "readings";
    pub const PATIENT_REPORTS: &str = "patient_reports";
    pub const PATIENT_FILES: &str = "patientFiles";
}

/// One document as returned by the store: its id plus the JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Value,
}

impl DocumentSnapshot {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        DocumentSnapshot {
            id: id.into(),
            data,
        }
    }

    /// Deserializes the body, exposing the document id as an `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        match &mut data {
            Value::Object(map) => {
                map.insert("id".to_string(), Value::String(self.id.clone()));
            }
            _ => {
                return Err(StoreError::Malformed(format!(
                    "document {} is not an object",
                    self.id
                )))
            }
        }
        Ok(serde_json::from_value(data)?)
    }
}

/// The managed document database.
///
/// Futures are `!Send`: the client runs on a single event loop.
pub trait RemoteStore {
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> LocalBoxFuture<'a, Result<Option<DocumentSnapshot>, StoreError>>;

    /// Inserts a document under a generated id and returns the id.
    fn add<'a>(&'a self, collection: &'a str, data: Value)
        -> LocalBoxFuture<'a, Result<String, StoreError>>;

    /// Creates or overwrites the document at `id`.
    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        data: Value,
    ) -> LocalBoxFuture<'a, Result<(), StoreError>>;

    /// Merges top-level `fields` into an existing document.
    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Value,
    ) -> LocalBoxFuture<'a, Result<(), StoreError>>;

    /// Removing an absent document is not an error.
    fn delete<'a>(&'a self, collection: &'a str, id: &'a str)
        -> LocalBoxFuture<'a, Result<(), StoreError>>;

    fn query<'a>(&'a self, query: &'a Query)
        -> LocalBoxFuture<'a, Result<Vec<DocumentSnapshot>, StoreError>>;

    /// Opens a live query. The current result set is delivered immediately,
    /// then a full snapshot after every change to the collection, until the
    /// returned handle is dropped.
    fn listen(&self, query: Query) -> Result<LiveQuery, StoreError>;
}

/// Blob storage for uploaded files.
pub trait BlobStore {
    /// Stores `bytes` under `path` and returns a retrievable URL.
    fn upload<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
        mime_type: &'a str,
    ) -> LocalBoxFuture<'a, Result<String, StoreError>>;

    fn download<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Option<Vec<u8>>, StoreError>>;
}

pub async fn fetch<T: DeserializeOwned>(
    store: &dyn RemoteStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(collection, id).await? {
        Some(snapshot) => Ok(Some(snapshot.decode()?)),
        None => Ok(None),
    }
}

pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn RemoteStore,
    query: &Query,
) -> Result<Vec<T>, StoreError> {
    store
        .query(query)
        .await?
        .iter()
        .map(DocumentSnapshot::decode)
        .collect()
}

pub async fn insert<T: Serialize>(
    store: &dyn RemoteStore,
    collection: &str,
    record: &T,
) -> Result<String, StoreError> {
    store.add(collection, serde_json::to_value(record)?).await
}

/// Decodes every document of a snapshot, skipping (and logging) malformed ones.
pub fn decode_snapshot<T: DeserializeOwned>(snapshot: &[DocumentSnapshot]) -> Vec<T> {
    snapshot
        .iter()
        .filter_map(|doc| match doc.decode() {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("[Storage] Skipping document {}: {}", doc.id, e);
                None
            }
        })
        .collect()
}
