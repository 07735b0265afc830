use crate::config::Config;
use crate::crypto::Crypto;
use crate::error::AppResult;
use crate::functions::{CloudFunctions, HttpFunctions};
use crate::navigation::Navigator;
use crate::session::SessionStore;
use crate::storage::{BlobStore, LocalStorage, RemoteStore, SqliteLocalStorage, SqliteStore};
use log::info;
use std::sync::Arc;

/// Everything a screen needs, handed to each controller explicitly.
/// Clones share the same backends and session state.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn RemoteStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub functions: Arc<dyn CloudFunctions>,
    pub sessions: SessionStore,
    pub crypto: Crypto,
    pub config: Config,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        blobs: Arc<dyn BlobStore>,
        functions: Arc<dyn CloudFunctions>,
        local: Arc<dyn LocalStorage>,
        config: Config,
    ) -> Self {
        let sessions = SessionStore::new(store.clone(), local, Navigator::default());
        AppContext {
            store,
            blobs,
            functions,
            sessions,
            crypto: Crypto::new(),
            config,
        }
    }

    /// Opens the configured databases and endpoint client.
    pub fn open(config: Config) -> AppResult<Self> {
        info!("[App] Opening document store at {}", config.database_path);
        let database = Arc::new(SqliteStore::new(&config.database_path)?);
        let local = Arc::new(SqliteLocalStorage::new(&config.device_storage_path)?);
        let functions = Arc::new(HttpFunctions::new(&config.functions_url));
        Ok(AppContext::new(database.clone(), database, functions, local, config))
    }

    pub fn navigator(&self) -> &Navigator {
        self.sessions.navigator()
    }

    pub fn store(&self) -> &dyn RemoteStore {
        self.store.as_ref()
    }
}
