//! Protected-screen lifecycle.
//!
//! A [`Screen`] revalidates the session on every focus and, once valid,
//! holds exactly one live query scoped to the signed-in user. The query is
//! reattached when its scoping key changes and released when the session is
//! invalidated or the screen is dropped.

use crate::app::AppContext;
use crate::error::{AppError, AppResult};
use crate::models::Session;
use crate::session::{SessionValidator, Validation};
use crate::storage::{LiveQuery, Query, Snapshot};
use futures_util::future::LocalBoxFuture;
use log::debug;
use std::fmt::Debug;

/// A live query together with the key it was opened for.
pub struct SubscriptionSlot<K> {
    current: Option<(K, LiveQuery)>,
}

impl<K> Default for SubscriptionSlot<K> {
    fn default() -> Self {
        SubscriptionSlot { current: None }
    }
}

impl<K: PartialEq + Debug> SubscriptionSlot<K> {
    /// Keeps the open query when `key` is unchanged; otherwise releases it and
    /// opens a new one. Returns whether a new query was opened.
    pub fn ensure<F>(&mut self, key: K, open: F) -> AppResult<bool>
    where
        F: FnOnce(&K) -> AppResult<LiveQuery>,
    {
        if matches!(&self.current, Some((current, _)) if *current == key) {
            return Ok(false);
        }
        self.release();
        let live = open(&key)?;
        debug!("[Screen] Subscribed for {:?}", key);
        self.current = Some((key, live));
        Ok(true)
    }

    pub fn key(&self) -> Option<&K> {
        self.current.as_ref().map(|(key, _)| key)
    }

    pub fn live(&mut self) -> Option<&mut LiveQuery> {
        self.current.as_mut().map(|(_, live)| live)
    }

    pub fn is_attached(&self) -> bool {
        self.current.is_some()
    }

    pub fn release(&mut self) {
        if let Some((key, live)) = self.current.take() {
            debug!("[Screen] Unsubscribed from {:?}", key);
            live.unsubscribe();
        }
    }
}

/// View logic fed by one live query.
pub trait LiveView {
    type Key: PartialEq + Clone + Debug;

    /// The identifier scoping the query, or `None` when there is nothing to watch.
    fn scope(&self, session: &Session) -> Option<Self::Key>;

    fn query(&self, key: &Self::Key) -> Query;

    /// Rebuilds derived state from a full snapshot.
    fn apply<'a>(&'a mut self, session: &'a Session, snapshot: Snapshot) -> LocalBoxFuture<'a, ()>;
}

pub struct Screen<V: LiveView> {
    ctx: AppContext,
    validator: SessionValidator,
    slot: SubscriptionSlot<V::Key>,
    view: V,
}

impl<V: LiveView> Screen<V> {
    pub fn mount(ctx: &AppContext, view: V) -> Self {
        Screen {
            ctx: ctx.clone(),
            validator: SessionValidator::new(ctx.sessions.clone()),
            slot: SubscriptionSlot::default(),
            view,
        }
    }

    /// Runs on every focus event. Revalidates the session, then makes sure
    /// the live query matches the current scope and applies its latest snapshot.
    pub async fn focus(&mut self) -> AppResult<Validation> {
        let validation = self.validator.validate().await;
        let session = match (validation, self.ctx.sessions.current()) {
            (Validation::Valid, Some(session)) => session,
            _ => {
                self.slot.release();
                return Ok(Validation::Invalid);
            }
        };

        match self.view.scope(&session) {
            Some(key) => {
                let store = self.ctx.store.clone();
                let view = &self.view;
                self.slot
                    .ensure(key, |key| store.listen(view.query(key)).map_err(AppError::from))?;
            }
            None => self.slot.release(),
        }
        self.refresh().await;
        Ok(Validation::Valid)
    }

    /// Applies the newest pending snapshot. Returns whether there was one.
    pub async fn refresh(&mut self) -> bool {
        let Some(session) = self.ctx.sessions.current() else {
            return false;
        };
        let latest = self.slot.live().and_then(LiveQuery::try_latest);
        match latest {
            Some(snapshot) => {
                self.view.apply(&session, snapshot).await;
                true
            }
            None => false,
        }
    }

    /// Waits for the next snapshot and applies it.
    pub async fn next_update(&mut self) -> bool {
        let Some(session) = self.ctx.sessions.current() else {
            return false;
        };
        let next = match self.slot.live() {
            Some(live) => live.next().await,
            None => None,
        };
        match next {
            Some(snapshot) => {
                self.view.apply(&session, snapshot).await;
                true
            }
            None => false,
        }
    }

    /// Protected content may only render after a successful validation.
    pub fn is_renderable(&self) -> bool {
        self.validator.state() == Validation::Valid
    }

    pub fn is_subscribed(&self) -> bool {
        self.slot.is_attached()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Tears the screen down, releasing its live query.
    pub fn unmount(mut self) -> V {
        self.slot.release();
        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RemoteStore, SqliteStore};
    use serde_json::json;

    #[tokio::test]
    async fn test_slot_reattaches_only_on_key_change() {
        let store = SqliteStore::new(":memory:").unwrap();
        let mut slot = SubscriptionSlot::default();
        let open = |key: &String| -> AppResult<LiveQuery> {
            Ok(store.listen(Query::new("readings").where_eq("userid", key.as_str()))?)
        };

        assert!(slot.ensure("u1".to_string(), open).unwrap());
        assert!(!slot.ensure("u1".to_string(), open).unwrap());
        assert_eq!(store.listener_count(), 1);

        assert!(slot.ensure("u2".to_string(), open).unwrap());
        assert_eq!(store.listener_count(), 1);
        assert_eq!(slot.key().map(String::as_str), Some("u2"));

        slot.release();
        assert_eq!(store.listener_count(), 0);
        store.add("readings", json!({"userid": "u2"})).await.unwrap();
        assert!(slot.live().is_none());
    }
}
