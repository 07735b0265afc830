use super::{DocumentSnapshot, Query};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

/// A full result set. Live queries deliver replacements, never diffs.
pub type Snapshot = Vec<DocumentSnapshot>;

pub type SharedRegistry = Arc<Mutex<ListenerRegistry>>;

struct Listener {
    query: Query,
    sender: mpsc::UnboundedSender<Snapshot>,
}

/// Open live queries of one store, keyed by registration id.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

impl ListenerRegistry {
    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(ListenerRegistry::default()))
    }

    pub fn register(&mut self, query: Query, sender: mpsc::UnboundedSender<Snapshot>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners.insert(id, Listener { query, sender });
        id
    }

    pub fn remove(&mut self, id: u64) {
        if self.listeners.remove(&id).is_some() {
            debug!("[Live] Listener {} detached", id);
        }
    }

    /// Queries of the listeners watching `collection`.
    pub fn watching(&self, collection: &str) -> Vec<(u64, Query)> {
        self.listeners
            .iter()
            .filter(|(_, listener)| listener.query.collection == collection)
            .map(|(id, listener)| (*id, listener.query.clone()))
            .collect()
    }

    /// Sends a snapshot; a listener whose receiver is gone is dropped.
    pub fn deliver(&mut self, id: u64, snapshot: Snapshot) {
        let closed = match self.listeners.get(&id) {
            Some(listener) => listener.sender.send(snapshot).is_err(),
            None => false,
        };
        if closed {
            self.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Detaches its listener from the registry when dropped.
pub struct Registration {
    id: u64,
    registry: Weak<Mutex<ListenerRegistry>>,
}

impl Registration {
    pub fn new(id: u64, registry: &SharedRegistry) -> Self {
        Registration {
            id,
            registry: Arc::downgrade(registry),
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.lock() {
                registry.remove(self.id);
            }
        }
    }
}

/// Handle to an open live query. Dropping it (or calling
/// [`LiveQuery::unsubscribe`]) stops delivery.
pub struct LiveQuery {
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    _registration: Registration,
}

impl LiveQuery {
    pub fn new(receiver: mpsc::UnboundedReceiver<Snapshot>, registration: Registration) -> Self {
        LiveQuery {
            receiver,
            _registration: registration,
        }
    }

    /// Waits for the next snapshot. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    /// Drains pending snapshots and returns the newest, if any.
    pub fn try_latest(&mut self) -> Option<Snapshot> {
        let mut latest = None;
        while let Ok(snapshot) = self.receiver.try_recv() {
            latest = Some(snapshot);
        }
        latest
    }

    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_drop_detaches_listener() {
        let registry = ListenerRegistry::shared();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.lock().unwrap().register(Query::new("readings"), tx);
        let live = LiveQuery::new(rx, Registration::new(id, &registry));
        assert_eq!(registry.lock().unwrap().len(), 1);

        live.unsubscribe();
        assert!(registry.lock().unwrap().is_empty());
    }

    #[test]
    fn test_try_latest_keeps_newest() {
        let registry = ListenerRegistry::shared();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.lock().unwrap().register(Query::new("readings"), tx);
        let mut live = LiveQuery::new(rx, Registration::new(id, &registry));

        {
            let mut guard = registry.lock().unwrap();
            guard.deliver(id, vec![DocumentSnapshot::new("a", json!({}))]);
            guard.deliver(id, vec![]);
        }
        assert_eq!(live.try_latest(), Some(vec![]));
        assert_eq!(live.try_latest(), None);
    }

    #[test]
    fn test_watching_filters_by_collection() {
        let mut registry = ListenerRegistry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(Query::new("readings"), tx.clone());
        registry.register(Query::new("messages"), tx);
        assert_eq!(registry.watching("messages").len(), 1);
        assert!(registry.watching("users").is_empty());
    }
}
