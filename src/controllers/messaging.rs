use super::{lookup_user, matches_search};
use crate::app::AppContext;
use crate::error::AppResult;
use crate::functions::SendMessageRequest;
use crate::models::{Message, Session};
use crate::screen::{LiveView, Screen};
use crate::storage::{collections, decode_snapshot, Direction, Filter, Query, Snapshot};
use futures_util::future::{join_all, LocalBoxFuture};
use log::error;
use serde_json::{json, Value};
use std::collections::HashMap;

/// One conversation with a single partner, ordered oldest first.
pub struct ChatView {
    ctx: AppContext,
    partner_id: String,
    partner_name: String,
    messages: Vec<Message>,
}

pub type ChatScreen = Screen<ChatView>;

impl ChatView {
    pub fn new(ctx: &AppContext, partner_id: &str, partner_name: &str) -> Self {
        ChatView {
            ctx: ctx.clone(),
            partner_id: partner_id.to_string(),
            partner_name: partner_name.to_string(),
            messages: Vec::new(),
        }
    }

    pub fn partner_name(&self) -> &str {
        &self.partner_name
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Sends through the `sendMessage` endpoint. Blank input is ignored and
    /// reported as `false`.
    pub async fn send(&self, session: &Session, text: &str) -> AppResult<bool> {
        if text.trim().is_empty() {
            return Ok(false);
        }
        let request = SendMessageRequest {
            sender_id: session.subject_id.clone(),
            receiver_id: self.partner_id.clone(),
            message_text: text.to_string(),
        };
        self.ctx.functions.send_message(&request).await?;
        Ok(true)
    }
}

impl LiveView for ChatView {
    type Key = (String, String);

    fn scope(&self, session: &Session) -> Option<Self::Key> {
        Some((session.subject_id.clone(), self.partner_id.clone()))
    }

    fn query(&self, (me, partner): &Self::Key) -> Query {
        let pair = [me.as_str(), partner.as_str()];
        Query::new(collections::MESSAGES)
            .where_in("senderId", pair)
            .where_in("receiverId", pair)
            .order_by("timestamp", Direction::Ascending)
    }

    fn apply<'a>(&'a mut self, session: &'a Session, snapshot: Snapshot) -> LocalBoxFuture<'a, ()> {
        Box::pin(async move {
            self.messages = decode_snapshot(&snapshot);
            let unread: Vec<String> = self
                .messages
                .iter()
                .filter(|m| m.receiver_id == session.subject_id && m.sender_id == self.partner_id && !m.is_read)
                .map(|m| m.id.clone())
                .collect();
            for id in unread {
                if let Err(e) = self
                    .ctx
                    .store()
                    .update(collections::MESSAGES, &id, json!({ "isRead": true }))
                    .await
                {
                    error!("[Chat] Failed to mark message {} read: {}", id, e);
                }
            }
        })
    }
}

/// Inbox row: the latest message exchanged with one partner.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub partner_id: String,
    pub partner_name: String,
    pub last_text: String,
    pub timestamp: i64,
    pub unread: bool,
}

/// Groups `messages` by partner, keeping the latest message of each and
/// flagging partners with unread messages addressed to `me`. Newest first.
pub fn summarize_conversations(me: &str, messages: &[Message]) -> Vec<(String, Message, bool)> {
    let mut latest: HashMap<&str, (&Message, bool)> = HashMap::new();
    for message in messages {
        let partner = if message.sender_id == me {
            message.receiver_id.as_str()
        } else {
            message.sender_id.as_str()
        };
        let unread = message.receiver_id == me && message.sender_id == partner && !message.is_read;
        let entry = latest.entry(partner).or_insert((message, false));
        if message.timestamp > entry.0.timestamp {
            entry.0 = message;
        }
        entry.1 |= unread;
    }

    let mut rows: Vec<(String, Message, bool)> = latest
        .into_iter()
        .map(|(partner, (message, unread))| (partner.to_string(), message.clone(), unread))
        .collect();
    rows.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp).then_with(|| a.0.cmp(&b.0)));
    rows
}

pub struct InboxView {
    ctx: AppContext,
    conversations: Vec<Conversation>,
}

pub type InboxScreen = Screen<InboxView>;

impl InboxView {
    pub fn new(ctx: &AppContext) -> Self {
        InboxView {
            ctx: ctx.clone(),
            conversations: Vec::new(),
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn search(&self, term: &str) -> Vec<&Conversation> {
        self.conversations
            .iter()
            .filter(|c| matches_search(&c.partner_name, term))
            .collect()
    }
}

impl LiveView for InboxView {
    type Key = String;

    fn scope(&self, session: &Session) -> Option<String> {
        Some(session.subject_id.clone())
    }

    fn query(&self, me: &String) -> Query {
        Query::new(collections::MESSAGES).where_any(vec![
            Filter::Eq("senderId".to_string(), Value::from(me.as_str())),
            Filter::Eq("receiverId".to_string(), Value::from(me.as_str())),
        ])
    }

    fn apply<'a>(&'a mut self, session: &'a Session, snapshot: Snapshot) -> LocalBoxFuture<'a, ()> {
        Box::pin(async move {
            let messages: Vec<Message> = decode_snapshot(&snapshot);
            let rows = summarize_conversations(&session.subject_id, &messages);
            let store = self.ctx.store();
            let names = join_all(rows.iter().map(|(partner, _, _)| lookup_user(store, partner))).await;

            self.conversations = rows
                .into_iter()
                .zip(names)
                .map(|((partner_id, message, unread), user)| Conversation {
                    partner_id,
                    partner_name: user
                        .map(|u| format!("{} {}", u.firstname, u.surname))
                        .unwrap_or_else(|| "Unknown".to_string()),
                    last_text: message.text,
                    timestamp: message.timestamp,
                    unread,
                })
                .collect();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn msg(id: &str, from: &str, to: &str, ts: i64, read: bool) -> Message {
        Message {
            id: id.to_string(),
            sender_id: from.to_string(),
            receiver_id: to.to_string(),
            text: format!("text {}", id),
            timestamp: ts,
            is_read: read,
        }
    }

    #[test]
    fn test_summarize_keeps_latest_per_partner() {
        let messages = vec![
            msg("1", "me", "ann", 10, true),
            msg("2", "ann", "me", 20, false),
            msg("3", "bob", "me", 5, true),
            msg("4", "me", "ann", 15, true),
        ];
        let rows = summarize_conversations("me", &messages);
        let summary: Vec<(&str, &str, bool)> = rows
            .iter()
            .map(|(partner, m, unread)| (partner.as_str(), m.id.as_str(), *unread))
            .collect();
        assert_eq!(summary, vec![("ann", "2", true), ("bob", "3", false)]);
    }

    #[test]
    fn test_own_unread_messages_do_not_flag() {
        let rows = summarize_conversations("me", &[msg("1", "me", "ann", 1, false)]);
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].2);
    }
}
