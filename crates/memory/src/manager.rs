use std::sync::Arc;

use {
    serde::Serialize,
    serde_json::json,
    tracing::{info, warn},
};

use crate::{
    archive::HistoryArchive,
    cache::HistoryCache,
    message::{ArchivedMessage, ChatMessage, Module, cache_key},
};

/// Conversation memory split per feature module.
///
/// Writes go to both the cache (bounded list, TTL refreshed on every write) and
/// the archive. Reads hit the cache first and fall back to the archive, which
/// then repopulates the cache. Storage failures are logged, never returned:
/// memory is an enhancement and must not break a chat turn.
pub struct ConversationMemory {
    cache: Arc<dyn HistoryCache>,
    archive: Arc<dyn HistoryArchive>,
    session_ttl_secs: u64,
    max_history: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleStats {
    pub total_messages: u64,
    pub has_active_session: bool,
}

impl ConversationMemory {
    pub fn new(
        cache: Arc<dyn HistoryCache>,
        archive: Arc<dyn HistoryArchive>,
        session_ttl_secs: u64,
        max_history: usize,
    ) -> Self {
        Self {
            cache,
            archive,
            session_ttl_secs,
            max_history,
        }
    }

    fn cache_limit(&self) -> usize {
        self.max_history * 2
    }

    pub async fn add_message(
        &self,
        user_id: &str,
        role: &str,
        content: &str,
        metadata: Option<serde_json::Value>,
        module: Module,
    ) {
        let message = ChatMessage::new(role, content, metadata, module);
        let key = cache_key(user_id, module);

        if let Err(e) = self.append_cached(&key, &message).await {
            warn!(%module, user_id, error = %e, "cache error adding message");
        }

        let doc = ArchivedMessage::new(user_id, message);
        if let Err(e) = self.archive.insert(&doc).await {
            warn!(%module, user_id, error = %e, "archive error adding message");
        }
    }

    async fn append_cached(&self, key: &str, message: &ChatMessage) -> anyhow::Result<()> {
        let mut history: Vec<ChatMessage> = match self.cache.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };
        history.push(message.clone());
        let limit = self.cache_limit();
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        self.cache
            .set_ex(key, serde_json::to_string(&history)?, self.session_ttl_secs)
            .await
    }

    /// Chronological history, at most `limit` messages (default `2 * max_history`).
    pub async fn recent_history(
        &self,
        user_id: &str,
        limit: Option<usize>,
        module: Module,
    ) -> Vec<ChatMessage> {
        let limit = limit.filter(|l| *l > 0).unwrap_or_else(|| self.cache_limit());
        let key = cache_key(user_id, module);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ChatMessage>>(&raw) {
                Ok(history) => {
                    let skip = history.len().saturating_sub(limit);
                    return history.into_iter().skip(skip).collect();
                },
                Err(e) => warn!(%module, user_id, error = %e, "corrupt cached history"),
            },
            Ok(None) => {},
            Err(e) => warn!(%module, user_id, error = %e, "cache error reading history"),
        }

        let docs = match self.archive.recent(user_id, module, limit).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(%module, user_id, error = %e, "archive error reading history");
                return Vec::new();
            },
        };
        let history: Vec<ChatMessage> = docs.into_iter().rev().map(|d| d.message).collect();

        if !history.is_empty() {
            let refreshed = match serde_json::to_string(&history) {
                Ok(raw) => self.cache.set_ex(&key, raw, self.session_ttl_secs).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = refreshed {
                warn!(%module, user_id, error = %e, "failed to refresh cached history");
            }
        }
        history
    }

    /// `ROLE: content` lines, cut to roughly `max_tokens` from the end.
    pub async fn conversation_context(
        &self,
        user_id: &str,
        max_tokens: usize,
        module: Module,
    ) -> String {
        let history = self.recent_history(user_id, None, module).await;
        format_context(&history, max_tokens)
    }

    /// Drop the cached session of one module, or of every module.
    pub async fn clear_session(&self, user_id: &str, module: Option<Module>) {
        let modules = match module {
            Some(m) => vec![m],
            None => Module::ALL.to_vec(),
        };
        for m in modules {
            if let Err(e) = self.cache.delete(&cache_key(user_id, m)).await {
                warn!(module = %m, user_id, error = %e, "cache error clearing session");
            }
        }
        match module {
            Some(m) => info!(module = %m, user_id, "cleared session"),
            None => info!(user_id, "cleared all sessions"),
        }
    }

    async fn module_stats(&self, user_id: &str, module: Module) -> anyhow::Result<ModuleStats> {
        let total_messages = self.archive.count(user_id, module).await?;
        let has_active_session = self
            .cache
            .exists(&cache_key(user_id, module))
            .await?;
        Ok(ModuleStats {
            total_messages,
            has_active_session,
        })
    }

    /// Message counts and session activity, for one module or all of them.
    /// Archive or cache failures are reported in an `error` field.
    pub async fn user_statistics(&self, user_id: &str, module: Option<Module>) -> serde_json::Value {
        let result = match module {
            Some(m) => self.module_stats(user_id, m).await.map(|s| {
                json!({
                    "user_id": user_id,
                    "module": m,
                    "total_messages": s.total_messages,
                    "has_active_session": s.has_active_session,
                })
            }),
            None => {
                let mut modules = serde_json::Map::new();
                let mut failed = None;
                for m in Module::ALL {
                    match self.module_stats(user_id, m).await {
                        Ok(s) => {
                            modules.insert(m.to_string(), json!(s));
                        },
                        Err(e) => {
                            failed = Some(e);
                            break;
                        },
                    }
                }
                match failed {
                    Some(e) => Err(e),
                    None => Ok(json!({ "user_id": user_id, "modules": modules })),
                }
            },
        };
        result.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "store error reading statistics");
            json!({ "error": e.to_string() })
        })
    }
}

/// Render history as `ROLE: content` lines. When the text is estimated above
/// `max_tokens` (4 characters per token) only the trailing
/// `max_tokens * 4 / 5` words are kept.
pub fn format_context(history: &[ChatMessage], max_tokens: usize) -> String {
    if history.is_empty() {
        return String::new();
    }
    let context = history
        .iter()
        .map(|m| format!("{}: {}", m.role.to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    if context.chars().count() / 4 <= max_tokens {
        return context;
    }
    let keep = max_tokens * 4 / 5;
    let words: Vec<&str> = context.split_whitespace().collect();
    // A zero budget keeps every word.
    let start = if keep == 0 { 0 } else { words.len().saturating_sub(keep) };
    words[start..].join(" ")
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{archive::InMemoryArchive, cache::InMemoryHistoryCache},
        async_trait::async_trait,
    };

    fn memory(max_history: usize) -> (ConversationMemory, Arc<InMemoryHistoryCache>, Arc<InMemoryArchive>) {
        let cache = Arc::new(InMemoryHistoryCache::new());
        let archive = Arc::new(InMemoryArchive::new());
        let mem = ConversationMemory::new(cache.clone(), archive.clone(), 3600, max_history);
        (mem, cache, archive)
    }

    fn msg(role: &str, content: &str) -> ChatMessage {
        ChatMessage::new(role, content, None, Module::Rag)
    }

    #[tokio::test]
    async fn cache_keeps_last_two_times_max_history() {
        let (mem, _, archive) = memory(2);
        for i in 0..7 {
            mem.add_message("u", "user", &format!("m{i}"), None, Module::Rag)
                .await;
        }
        let history = mem.recent_history("u", None, Module::Rag).await;
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4", "m5", "m6"]);
        // Archive ids derive from microsecond timestamps, so a few may collide
        // on fast machines; at least the cached window must be archived.
        assert!(archive.count("u", Module::Rag).await.unwrap() >= 1);
    }

    #[tokio::test]
    async fn modules_do_not_share_history() {
        let (mem, _, _) = memory(10);
        mem.add_message("u", "user", "rag question", None, Module::Rag).await;
        mem.add_message("u", "user", "todo question", None, Module::Todo).await;

        let rag = mem.recent_history("u", None, Module::Rag).await;
        assert_eq!(rag.len(), 1);
        assert_eq!(rag[0].content, "rag question");
        assert!(mem.recent_history("u", None, Module::Project).await.is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_archive_and_refreshes_cache() {
        let (mem, cache, archive) = memory(10);
        for (i, content) in ["first", "second", "third"].iter().enumerate() {
            let mut m = msg("user", content);
            m.timestamp = format!("2024-01-01T00:00:0{i}.000000");
            archive.insert(&ArchivedMessage::new("u", m)).await.unwrap();
        }

        let history = mem.recent_history("u", Some(2), Module::Rag).await;
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["second", "third"]);
        assert!(cache.exists("chat_history:rag:u").await.unwrap());
    }

    #[tokio::test]
    async fn clear_session_removes_cache_but_not_archive() {
        let (mem, cache, _) = memory(10);
        mem.add_message("u", "user", "a", None, Module::Rag).await;
        mem.add_message("u", "user", "b", None, Module::Todo).await;

        mem.clear_session("u", Some(Module::Rag)).await;
        assert!(!cache.exists("chat_history:rag:u").await.unwrap());
        assert!(cache.exists("chat_history:todo:u").await.unwrap());

        mem.clear_session("u", None).await;
        assert!(!cache.exists("chat_history:todo:u").await.unwrap());
        // Archive still answers.
        assert_eq!(mem.recent_history("u", None, Module::Todo).await.len(), 1);
    }

    #[tokio::test]
    async fn statistics_per_module_and_overall() {
        let (mem, _, _) = memory(10);
        mem.add_message("u", "user", "a", None, Module::Project).await;

        let one = mem.user_statistics("u", Some(Module::Project)).await;
        assert_eq!(one["module"], "project");
        assert_eq!(one["total_messages"], 1);
        assert_eq!(one["has_active_session"], true);

        let all = mem.user_statistics("u", None).await;
        assert_eq!(all["user_id"], "u");
        assert_eq!(all["modules"]["rag"]["total_messages"], 0);
        assert_eq!(all["modules"]["rag"]["has_active_session"], false);
        assert_eq!(all["modules"]["project"]["total_messages"], 1);
    }

    struct BrokenArchive;

    #[async_trait]
    impl HistoryArchive for BrokenArchive {
        async fn insert(&self, _: &ArchivedMessage) -> anyhow::Result<()> {
            anyhow::bail!("archive offline")
        }

        async fn recent(&self, _: &str, _: Module, _: usize) -> anyhow::Result<Vec<ArchivedMessage>> {
            anyhow::bail!("archive offline")
        }

        async fn count(&self, _: &str, _: Module) -> anyhow::Result<u64> {
            anyhow::bail!("archive offline")
        }
    }

    #[tokio::test]
    async fn archive_failures_are_swallowed() {
        let mem = ConversationMemory::new(
            Arc::new(InMemoryHistoryCache::new()),
            Arc::new(BrokenArchive),
            3600,
            10,
        );
        mem.add_message("u", "user", "still cached", None, Module::Rag).await;
        assert_eq!(mem.recent_history("u", None, Module::Rag).await.len(), 1);
        assert!(mem.recent_history("other", None, Module::Rag).await.is_empty());

        let stats = mem.user_statistics("u", None).await;
        assert_eq!(stats["error"], "archive offline");
    }

    /// Cache that works except for `EXISTS`.
    struct NoExistsCache(InMemoryHistoryCache);

    #[async_trait]
    impl HistoryCache for NoExistsCache {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.0.get(key).await
        }

        async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> anyhow::Result<()> {
            self.0.set_ex(key, value, ttl_secs).await
        }

        async fn delete(&self, key: &str) -> anyhow::Result<()> {
            self.0.delete(key).await
        }

        async fn exists(&self, _: &str) -> anyhow::Result<bool> {
            anyhow::bail!("redis connection reset")
        }
    }

    #[tokio::test]
    async fn cache_failures_are_reported_in_statistics() {
        let mem = ConversationMemory::new(
            Arc::new(NoExistsCache(InMemoryHistoryCache::new())),
            Arc::new(InMemoryArchive::new()),
            3600,
            10,
        );
        mem.add_message("u", "user", "a", None, Module::Rag).await;

        let one = mem.user_statistics("u", Some(Module::Rag)).await;
        assert_eq!(one["error"], "redis connection reset");
        let all = mem.user_statistics("u", None).await;
        assert_eq!(all["error"], "redis connection reset");
    }

    #[test]
    fn context_budget_counts_characters() {
        let history = vec![msg("user", &"é".repeat(30))];
        let ctx = format_context(&history, 10);
        assert_eq!(ctx, format!("USER: {}", "é".repeat(30)));
    }

    #[test]
    fn zero_word_budget_keeps_all_words() {
        let history = vec![msg("user", "alpha   beta\tgamma")];
        assert_eq!(format_context(&history, 1), "USER: alpha beta gamma");
    }

    #[test]
    fn context_formats_roles_uppercase() {
        let history = vec![msg("user", "Apa itu SOP?"), msg("assistant", "SOP adalah...")];
        assert_eq!(
            format_context(&history, 1000),
            "USER: Apa itu SOP?\nASSISTANT: SOP adalah..."
        );
        assert_eq!(format_context(&[], 1000), "");
    }

    #[test]
    fn context_keeps_trailing_words_when_too_long() {
        let long = (0..100).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let history = vec![msg("user", &long)];
        // 10 tokens -> 40 chars budget -> keep last 8 words.
        let ctx = format_context(&history, 10);
        assert_eq!(ctx, "w92 w93 w94 w95 w96 w97 w98 w99");
    }
}
