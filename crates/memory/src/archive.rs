/// Long-term message archive.
use {async_trait::async_trait, dashmap::DashMap};

use crate::message::{ArchivedMessage, Module};

#[async_trait]
pub trait HistoryArchive: Send + Sync {
    /// Store a message. Inserting an id that already exists is not an error.
    async fn insert(&self, doc: &ArchivedMessage) -> anyhow::Result<()>;

    /// Newest-first messages of one user in one module.
    async fn recent(
        &self,
        user_id: &str,
        module: Module,
        limit: usize,
    ) -> anyhow::Result<Vec<ArchivedMessage>>;

    async fn count(&self, user_id: &str, module: Module) -> anyhow::Result<u64>;
}

/// Archive kept in process memory, keyed by user.
#[derive(Default)]
pub struct InMemoryArchive {
    by_user: DashMap<String, Vec<ArchivedMessage>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryArchive for InMemoryArchive {
    async fn insert(&self, doc: &ArchivedMessage) -> anyhow::Result<()> {
        let mut docs = self.by_user.entry(doc.user_id.clone()).or_default();
        if !docs.iter().any(|d| d.id == doc.id) {
            docs.push(doc.clone());
        }
        Ok(())
    }

    async fn recent(
        &self,
        user_id: &str,
        module: Module,
        limit: usize,
    ) -> anyhow::Result<Vec<ArchivedMessage>> {
        let Some(docs) = self.by_user.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut matching: Vec<ArchivedMessage> = docs
            .iter()
            .filter(|d| d.module == module)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn count(&self, user_id: &str, module: Module) -> anyhow::Result<u64> {
        Ok(self
            .by_user
            .get(user_id)
            .map_or(0, |docs| docs.iter().filter(|d| d.module == module).count() as u64))
    }
}
