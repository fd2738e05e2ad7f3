//! Chat threads and their messages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title shown for a thread that has no messages yet.
pub const PLACEHOLDER_TITLE: &str = "New Policy Chat";

/// Number of characters of the first message kept in a derived title.
pub const TITLE_CHARS: usize = 30;

const TITLE_ELLIPSIS: &str = "...";

/// Thread identifier. Allocated in creation order, so ids sort oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Message identifier, unique within its thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single immutable chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub role: Role,
    /// Creation time, serialized as RFC 3339.
    pub timestamp: DateTime<Utc>,
}

/// A conversation: a title and an append-only list of messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatThread {
    id: ThreadId,
    title: String,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    next_message_id: u64,
}

impl ChatThread {
    pub(crate) fn new(id: ThreadId) -> Self {
        Self {
            id,
            title: PLACEHOLDER_TITLE.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
            next_message_id: 1,
        }
    }

    #[must_use]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Messages in conversation order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Timestamp of the newest message, if any.
    #[must_use]
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    pub(crate) fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Append a message, deriving the title when it is the first user message.
    pub(crate) fn push(&mut self, role: Role, content: impl Into<String>) -> &Message {
        let content = content.into();
        if self.messages.is_empty() && role == Role::User {
            self.title = derive_title(&content);
        }

        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;
        self.messages.push(Message {
            id,
            content,
            role,
            timestamp: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }
}

/// Title derived from a thread's first message: its first 30 characters
/// followed by an ellipsis.
#[must_use]
pub fn derive_title(text: &str) -> String {
    let mut title: String = text.chars().take(TITLE_CHARS).collect();
    title.push_str(TITLE_ELLIPSIS);
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_lifecycle() {
        let mut thread = ChatThread::new(ThreadId(7));

        assert_eq!(thread.id(), ThreadId(7));
        assert_eq!(thread.title(), PLACEHOLDER_TITLE);
        assert!(thread.messages().is_empty());
        assert!(thread.last_activity().is_none());

        thread.push(Role::User, "Hello");
        thread.push(Role::Assistant, "Hi there!");

        let messages = thread.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_ne!(messages[0].id, messages[1].id);
        assert_eq!(thread.title(), "Hello...");
    }

    #[test]
    fn test_title_only_from_first_message() {
        let mut thread = ChatThread::new(ThreadId(1));
        thread.push(Role::User, "first");
        thread.push(Role::User, "second");
        assert_eq!(thread.title(), "first...");
    }

    #[test]
    fn test_derive_title_counts_chars() {
        let long = "a".repeat(45);
        assert_eq!(derive_title(&long), format!("{}...", "a".repeat(30)));

        // Multi-byte characters are never split.
        let accents = "é".repeat(40);
        assert_eq!(derive_title(&accents).chars().count(), 33);
    }

    #[test]
    fn test_message_serializes_lowercase_role() {
        let mut thread = ChatThread::new(ThreadId(1));
        let message = thread.push(Role::Assistant, "ok").clone();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["id"], 1);
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }
}
