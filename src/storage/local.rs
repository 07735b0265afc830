use crate::error::LocalStorageError;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

/// Device-local key/value storage.
pub trait LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), LocalStorageError>;
    fn remove_item(&self, key: &str) -> Result<(), LocalStorageError>;
}

pub struct SqliteLocalStorage {
    conn: Mutex<Connection>,
}

impl SqliteLocalStorage {
    pub fn new(db_path: &str) -> Result<Self, LocalStorageError> {
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(SqliteLocalStorage {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, LocalStorageError> {
        // A poisoned lock still guards a usable connection.
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(f(&conn)?)
    }
}

impl LocalStorage for SqliteLocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStorageError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
                .optional()
        })
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), LocalStorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map(|_| ())
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), LocalStorageError> {
        self.with_conn(|conn| conn.execute("DELETE FROM kv WHERE key = ?1", [key]).map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let storage = SqliteLocalStorage::new(":memory:").unwrap();
        assert_eq!(storage.get_item("userSession").unwrap(), None);

        storage.set_item("userSession", "{}").unwrap();
        storage.set_item("userSession", "{\"a\":1}").unwrap();
        assert_eq!(storage.get_item("userSession").unwrap().as_deref(), Some("{\"a\":1}"));

        storage.remove_item("userSession").unwrap();
        assert_eq!(storage.get_item("userSession").unwrap(), None);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.db");
        let path = path.to_str().unwrap();

        SqliteLocalStorage::new(path).unwrap().set_item("k", "v").unwrap();
        let reopened = SqliteLocalStorage::new(path).unwrap();
        assert_eq!(reopened.get_item("k").unwrap().as_deref(), Some("v"));
    }
}
