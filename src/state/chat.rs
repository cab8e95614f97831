//! Per-session chat history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::connection::ClientId;

/// Default number of messages kept per session.
pub const DEFAULT_CHAT_HISTORY: usize = 100;

/// A chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub sender_id: ClientId,
    pub sender_name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender_id: ClientId, sender_name: String, text: String) -> Self {
        Self {
            sender_id,
            sender_name,
            text,
            sent_at: Utc::now(),
        }
    }
}

/// Bounded log; the oldest message is dropped on overflow.
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: VecDeque<ChatMessage>,
    limit: usize,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::with_limit(DEFAULT_CHAT_HISTORY)
    }
}

impl ChatLog {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(limit.min(DEFAULT_CHAT_HISTORY)),
            limit,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        if self.limit == 0 {
            return;
        }
        while self.messages.len() >= self.limit {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Messages, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(n: usize) -> ChatMessage {
        ChatMessage::new("a".to_string(), "Alice".to_string(), format!("msg {}", n))
    }

    #[test]
    fn test_push_and_read() {
        let mut log = ChatLog::default();
        assert!(log.is_empty());
        log.push(message(1));
        log.push(message(2));
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages().next().unwrap().text, "msg 1");
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut log = ChatLog::default();
        for n in 0..150 {
            log.push(message(n));
        }
        assert_eq!(log.len(), DEFAULT_CHAT_HISTORY);
        assert_eq!(log.messages().next().unwrap().text, "msg 50");
        assert_eq!(log.messages().last().unwrap().text, "msg 149");
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let mut log = ChatLog::with_limit(0);
        log.push(message(1));
        assert!(log.is_empty());
    }
}
