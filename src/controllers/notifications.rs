use super::matches_search;
use crate::app::AppContext;
use crate::models::{Notification, Session};
use crate::screen::{LiveView, Screen};
use crate::storage::{collections, decode_snapshot, Direction, Query, Snapshot};
use futures_util::future::LocalBoxFuture;
use log::error;
use serde_json::json;

pub const PRIORITY_LEVELS: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Default)]
pub struct NotificationsView {
    notifications: Vec<Notification>,
}

pub type NotificationsScreen = Screen<NotificationsView>;

impl NotificationsView {
    pub fn new() -> Self {
        NotificationsView::default()
    }

    /// Newest first.
    pub fn all(&self) -> &[Notification] {
        &self.notifications
    }

    /// `priority` of `None` keeps every level.
    pub fn filtered(&self, priority: Option<u8>, term: &str) -> Vec<&Notification> {
        self.notifications
            .iter()
            .filter(|n| priority.map_or(true, |level| n.priority == level))
            .filter(|n| matches_search(&n.message, term))
            .collect()
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

impl LiveView for NotificationsView {
    type Key = String;

    fn scope(&self, session: &Session) -> Option<String> {
        Some(session.subject_id.clone())
    }

    fn query(&self, user_id: &String) -> Query {
        Query::new(collections::NOTIFICATIONS)
            .where_eq("userid", user_id.as_str())
            .order_by("timestamp", Direction::Descending)
    }

    fn apply<'a>(&'a mut self, _session: &'a Session, snapshot: Snapshot) -> LocalBoxFuture<'a, ()> {
        Box::pin(async move {
            self.notifications = decode_snapshot(&snapshot);
        })
    }
}

/// Sets the read flag. Failures are logged only.
pub async fn mark_read(ctx: &AppContext, notification_id: &str) {
    if let Err(e) = ctx
        .store()
        .update(collections::NOTIFICATIONS, notification_id, json!({ "read": true }))
        .await
    {
        error!("[Notifications] Failed to mark {} read: {}", notification_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, message: &str, priority: u8, read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            user_id: "u1".to_string(),
            message: message.to_string(),
            priority,
            read,
            timestamp: Some(0),
        }
    }

    #[test]
    fn test_filter_by_priority_and_text() {
        let view = NotificationsView {
            notifications: vec![
                note("1", "Appointment moved", 2, false),
                note("2", "New report available", 5, true),
                note("3", "Report flagged", 2, false),
            ],
        };
        let ids = |list: Vec<&Notification>| list.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(view.filtered(None, "")), ["1", "2", "3"]);
        assert_eq!(ids(view.filtered(Some(2), "")), ["1", "3"]);
        assert_eq!(ids(view.filtered(None, "REPORT")), ["2", "3"]);
        assert_eq!(ids(view.filtered(Some(2), "report")), ["3"]);
        assert_eq!(view.unread_count(), 2);
    }
}
