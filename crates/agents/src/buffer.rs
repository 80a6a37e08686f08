use dashmap::DashMap;

/// Per-user rolling chat transcript for the top-level assistant.
///
/// Holds `{role, content}` messages ready to be passed as agent history.
/// Only the last `max_messages` entries of each user are kept.
pub struct ConversationBuffer {
    max_messages: usize,
    users: DashMap<String, Vec<serde_json::Value>>,
}

impl ConversationBuffer {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            users: DashMap::new(),
        }
    }

    pub fn history(&self, user_id: &str) -> Vec<serde_json::Value> {
        self.users
            .get(user_id)
            .map(|h| h.value().clone())
            .unwrap_or_default()
    }

    /// Record one completed exchange.
    pub fn push_exchange(&self, user_id: &str, user: &str, assistant: &str) {
        let mut entry = self.users.entry(user_id.to_string()).or_default();
        entry.push(serde_json::json!({ "role": "user", "content": user }));
        entry.push(serde_json::json!({ "role": "assistant", "content": assistant }));
        let excess = entry.len().saturating_sub(self.max_messages);
        if excess > 0 {
            entry.drain(..excess);
        }
    }

    pub fn clear(&self, user_id: &str) {
        self.users.remove(user_id);
    }
}
