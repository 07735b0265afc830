use super::live::{ListenerRegistry, LiveQuery, Registration, SharedRegistry};
use super::{BlobStore, DocumentSnapshot, Query, RemoteStore};
use crate::error::StoreError;
use futures_util::future::LocalBoxFuture;
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use uuid::Uuid;

const BLOB_SCHEME: &str = "blob://";

/// Document and blob store on a single SQLite database.
///
/// Documents are JSON bodies keyed by `(collection, id)`. Every write
/// re-runs the live queries watching the written collection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    listeners: SharedRegistry,
}

impl SqliteStore {
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS blobs (
                path TEXT PRIMARY KEY,
                mime_type TEXT NOT NULL,
                data BLOB NOT NULL
            )",
            [],
        )?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            listeners: ListenerRegistry::shared(),
        })
    }

    /// Number of open live queries.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|registry| registry.len()).unwrap_or(0)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Malformed("connection lock poisoned".to_string()))
    }

    fn read(&self, collection: &str, id: &str) -> Result<Option<DocumentSnapshot>, StoreError> {
        let conn = self.conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(Some(DocumentSnapshot::new(id, serde_json::from_str(&body)?))),
            None => Ok(None),
        }
    }

    fn write(&self, collection: &str, id: &str, data: &Value) -> Result<(), StoreError> {
        if !data.is_object() {
            return Err(StoreError::Malformed(format!(
                "{}/{} must be a JSON object",
                collection, id
            )));
        }
        self.conn()?.execute(
            "INSERT OR REPLACE INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
            params![collection, id, serde_json::to_string(data)?],
        )?;
        Ok(())
    }

    fn load_collection(&self, collection: &str) -> Result<Vec<DocumentSnapshot>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, body FROM documents WHERE collection = ?1")?;
        let rows = stmt.query_map([collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, body) = row?;
            docs.push(DocumentSnapshot::new(id, serde_json::from_str(&body)?));
        }
        Ok(docs)
    }

    fn run_query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>, StoreError> {
        Ok(query.apply(self.load_collection(&query.collection)?))
    }

    /// Pushes fresh snapshots to every live query on `collection`.
    fn notify(&self, collection: &str) {
        let watching = match self.listeners.lock() {
            Ok(registry) => registry.watching(collection),
            Err(_) => return,
        };
        for (id, query) in watching {
            match self.run_query(&query) {
                Ok(snapshot) => {
                    if let Ok(mut registry) = self.listeners.lock() {
                        registry.deliver(id, snapshot);
                    }
                }
                Err(e) => error!("[Live] Re-query for listener {} failed: {}", id, e),
            }
        }
    }
}

impl RemoteStore for SqliteStore {
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> LocalBoxFuture<'a, Result<Option<DocumentSnapshot>, StoreError>> {
        Box::pin(async move { self.read(collection, id) })
    }

    fn add<'a>(&'a self, collection: &'a str, data: Value) -> LocalBoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move {
            let id = Uuid::new_v4().simple().to_string();
            self.write(collection, &id, &data)?;
            debug!("[Storage] Added {}/{}", collection, id);
            self.notify(collection);
            Ok(id)
        })
    }

    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        data: Value,
    ) -> LocalBoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.write(collection, id, &data)?;
            self.notify(collection);
            Ok(())
        })
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Value,
    ) -> LocalBoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut current = self
                .read(collection, id)?
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?
                .data;
            let (Value::Object(target), Value::Object(changes)) = (&mut current, fields) else {
                return Err(StoreError::Malformed(format!(
                    "update of {}/{} needs an object",
                    collection, id
                )));
            };
            for (key, value) in changes {
                target.insert(key, value);
            }
            self.write(collection, id, &current)?;
            self.notify(collection);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, collection: &'a str, id: &'a str) -> LocalBoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.conn()?.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            self.notify(collection);
            Ok(())
        })
    }

    fn query<'a>(&'a self, query: &'a Query) -> LocalBoxFuture<'a, Result<Vec<DocumentSnapshot>, StoreError>> {
        Box::pin(async move { self.run_query(query) })
    }

    fn listen(&self, query: Query) -> Result<LiveQuery, StoreError> {
        let initial = self.run_query(&query)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is still held here, so this cannot fail.
        let _ = sender.send(initial);

        let mut registry = self
            .listeners
            .lock()
            .map_err(|_| StoreError::Malformed("listener registry poisoned".to_string()))?;
        let id = registry.register(query, sender);
        drop(registry);

        Ok(LiveQuery::new(receiver, Registration::new(id, &self.listeners)))
    }
}

impl BlobStore for SqliteStore {
    fn upload<'a>(
        &'a self,
        path: &'a str,
        bytes: Vec<u8>,
        mime_type: &'a str,
    ) -> LocalBoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move {
            self.conn()?.execute(
                "INSERT OR REPLACE INTO blobs (path, mime_type, data) VALUES (?1, ?2, ?3)",
                params![path, mime_type, bytes],
            )?;
            Ok(format!("{}{}", BLOB_SCHEME, path))
        })
    }

    fn download<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Option<Vec<u8>>, StoreError>> {
        Box::pin(async move {
            let Some(path) = url.strip_prefix(BLOB_SCHEME) else {
                return Ok(None);
            };
            let data = self
                .conn()?
                .query_row("SELECT data FROM blobs WHERE path = ?1", [path], |row| row.get(0))
                .optional()?;
            Ok(data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Direction;
    use serde_json::json;

    fn setup_in_memory_db() -> SqliteStore {
        SqliteStore::new(":memory:").unwrap()
    }

    #[tokio::test]
    async fn test_add_and_get_document() {
        let store = setup_in_memory_db();
        let id = store.add("users", json!({"email": "a@b.co"})).await.unwrap();
        let doc = store.get("users", &id).await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.data["email"], "a@b.co");
        assert!(store.get("users", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_and_requires_existing() {
        let store = setup_in_memory_db();
        store
            .set("appointments", "a1", json!({"address": "x", "reason": "checkup"}))
            .await
            .unwrap();
        store
            .update("appointments", "a1", json!({"address": "y"}))
            .await
            .unwrap();
        let doc = store.get("appointments", "a1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"address": "y", "reason": "checkup"}));

        let missing = store.update("appointments", "nope", json!({"a": 1})).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = setup_in_memory_db();
        store.set("sessions", "s1", json!({"token": "t"})).await.unwrap();
        store.delete("sessions", "s1").await.unwrap();
        store.delete("sessions", "s1").await.unwrap();
        assert!(store.get("sessions", "s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_non_object_documents() {
        let store = setup_in_memory_db();
        let result = store.set("users", "u1", json!("text")).await;
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_live_query_receives_full_snapshots() {
        let store = setup_in_memory_db();
        store.add("readings", json!({"userid": "u1", "bpm": 70, "timestamp": 1})).await.unwrap();

        let query = Query::new("readings")
            .where_eq("userid", "u1")
            .order_by("timestamp", Direction::Ascending);
        let mut live = store.listen(query).unwrap();
        assert_eq!(live.next().await.unwrap().len(), 1);

        store.add("readings", json!({"userid": "u2", "bpm": 90, "timestamp": 2})).await.unwrap();
        store.add("readings", json!({"userid": "u1", "bpm": 75, "timestamp": 3})).await.unwrap();
        let latest = live.try_latest().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[1].data["bpm"], 75);
    }

    #[tokio::test]
    async fn test_dropped_live_query_stops_delivery() {
        let store = setup_in_memory_db();
        let live = store.listen(Query::new("messages")).unwrap();
        assert_eq!(store.listener_count(), 1);
        live.unsubscribe();
        assert_eq!(store.listener_count(), 0);
        store.add("messages", json!({"messageText": "hi"})).await.unwrap();
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_blob_round_trip() {
        let store = setup_in_memory_db();
        let url = store
            .upload("patient_files/p1/scan.pdf", b"%PDF".to_vec(), "application/pdf")
            .await
            .unwrap();
        assert_eq!(url, "blob://patient_files/p1/scan.pdf");
        assert_eq!(store.download(&url).await.unwrap(), Some(b"%PDF".to_vec()));
        assert_eq!(store.download("https://elsewhere/x").await.unwrap(), None);
    }
}
