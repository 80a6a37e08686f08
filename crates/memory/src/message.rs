use std::{fmt, str::FromStr};

use {
    serde::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
};

/// Feature area a conversation belongs to. Each module has its own history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Rag,
    Project,
    Todo,
}

impl Module {
    pub const ALL: [Module; 3] = [Module::Rag, Module::Project, Module::Todo];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rag => "rag",
            Self::Project => "project",
            Self::Todo => "todo",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rag" => Ok(Self::Rag),
            "project" => Ok(Self::Project),
            "todo" => Ok(Self::Todo),
            other => anyhow::bail!("unknown memory module: {other}"),
        }
    }
}

/// One stored chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub module: Module,
}

impl ChatMessage {
    pub fn new(
        role: impl Into<String>,
        content: impl Into<String>,
        metadata: Option<serde_json::Value>,
        module: Module,
    ) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: assistant_common::time::now_iso(),
            metadata: metadata.unwrap_or_else(|| serde_json::json!({})),
            module,
        }
    }
}

/// Long-term archive document, partitioned by `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedMessage {
    pub id: String,
    pub user_id: String,
    pub module: Module,
    pub message: ChatMessage,
    pub created_at: String,
}

impl ArchivedMessage {
    pub fn new(user_id: &str, message: ChatMessage) -> Self {
        let digest = Sha256::digest(message.timestamp.as_bytes());
        let short = format!("{digest:x}");
        Self {
            id: format!("{}_{}_{}", message.module, user_id, &short[..8]),
            user_id: user_id.to_string(),
            module: message.module,
            created_at: message.timestamp.clone(),
            message,
        }
    }
}

/// Cache key for a user's history in one module.
pub fn cache_key(user_id: &str, module: Module) -> String {
    format!("chat_history:{module}:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_module_scoped() {
        assert_eq!(cache_key("u1", Module::Todo), "chat_history:todo:u1");
        assert_ne!(
            cache_key("u1", Module::Rag),
            cache_key("u1", Module::Project)
        );
    }

    #[test]
    fn module_round_trips_through_str() {
        for m in Module::ALL {
            assert_eq!(m.as_str().parse::<Module>().unwrap(), m);
        }
        assert!("chat".parse::<Module>().is_err());
        assert_eq!(serde_json::to_string(&Module::Project).unwrap(), "\"project\"");
    }

    #[test]
    fn archive_id_is_stable_for_a_timestamp() {
        let mut msg = ChatMessage::new("user", "hi", None, Module::Rag);
        msg.timestamp = "2024-05-01T08:30:00.000000".into();
        let a = ArchivedMessage::new("alice", msg.clone());
        let b = ArchivedMessage::new("alice", msg);
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("rag_alice_"));
        assert_eq!(a.id.len(), "rag_alice_".len() + 8);
        assert_eq!(a.created_at, "2024-05-01T08:30:00.000000");
    }

    #[test]
    fn missing_metadata_defaults_to_object() {
        let msg = ChatMessage::new("assistant", "ok", None, Module::Todo);
        assert!(msg.metadata.is_object());
    }
}
