//! Per-chat conversation history.
//!
//! The outer map lock is only held to look up or insert a session; all work
//! on a conversation happens under that chat's own mutex.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::record::HistoryEntry;

/// Conversation held for one chat.
#[derive(Debug, Default)]
pub struct ChatSession {
    history: Vec<HistoryEntry>,
}

impl ChatSession {
    /// Last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.history.push(HistoryEntry {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// `chat_id -> session` map shared by all requests.
#[derive(Debug, Default)]
pub struct ChatStateStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<ChatSession>>>>,
}

impl ChatStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session handle for `chat_id`, created empty on first use.
    pub async fn session(&self, chat_id: &str) -> Arc<Mutex<ChatSession>> {
        if let Some(s) = self.sessions.read().await.get(chat_id) {
            return Arc::clone(s);
        }
        let mut w = self.sessions.write().await;
        Arc::clone(w.entry(chat_id.to_string()).or_default())
    }

    /// Drops the history of one chat. Returns whether it existed.
    pub async fn forget(&self, chat_id: &str) -> bool {
        self.sessions.write().await.remove(chat_id).is_some()
    }

    /// Drops every history.
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }

    /// Number of chats with a session.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn push(store: &ChatStateStore, chat_id: &str, q: &str, a: &str) {
        store.session(chat_id).await.lock().await.push(q, a);
    }

    #[tokio::test]
    async fn recent_returns_tail_in_order() {
        let store = ChatStateStore::new();
        for i in 0..5 {
            push(&store, "c1", &format!("q{i}"), &format!("a{i}")).await;
        }
        let session = store.session("c1").await;
        let session = session.lock().await;
        let qs: Vec<_> = session.recent(3).iter().map(|e| e.question.as_str()).collect();
        assert_eq!(qs, vec!["q2", "q3", "q4"]);
        assert_eq!(session.recent(10).len(), 5);
    }

    #[tokio::test]
    async fn forget_and_clear_are_scoped() {
        let store = ChatStateStore::new();
        push(&store, "c1", "q", "a").await;
        push(&store, "c2", "q", "a").await;

        assert!(store.forget("c1").await);
        assert!(!store.forget("c1").await);
        assert!(store.session("c1").await.lock().await.is_empty());
        assert_eq!(store.session("c2").await.lock().await.len(), 1);

        store.clear().await;
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn session_handle_is_shared() {
        let store = ChatStateStore::new();
        let a = store.session("c").await;
        let b = store.session("c").await;
        assert!(Arc::ptr_eq(&a, &b));
        a.lock().await.push("q", "a");
        assert_eq!(b.lock().await.len(), 1);
    }
}
