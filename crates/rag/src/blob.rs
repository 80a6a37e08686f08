//! Object storage for the raw documents.

use std::collections::BTreeMap;

use {
    assistant_common::AssistantError,
    async_trait::async_trait,
    chrono::{DateTime, Duration, Utc},
    serde::Serialize,
    tokio::sync::RwLock,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlobItem {
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub creation_time: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Blobs whose name starts with `prefix` (all blobs for an empty prefix).
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobItem>>;

    async fn download(&self, name: &str) -> anyhow::Result<Vec<u8>>;

    /// Create or overwrite a blob.
    async fn upload(&self, name: &str, data: Vec<u8>, content_type: &str) -> anyhow::Result<()>;

    async fn exists(&self, name: &str) -> anyhow::Result<bool>;

    /// Returns `false` when the blob did not exist.
    async fn delete(&self, name: &str) -> anyhow::Result<bool>;

    /// Plain (unsigned) URL of a blob.
    fn url(&self, name: &str) -> String;

    /// Time-limited read-only URL.
    fn read_sas_url(&self, name: &str, expiry_minutes: i64) -> Result<String, AssistantError>;
}

struct StoredBlob {
    data: Vec<u8>,
    content_type: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

/// Process-local blob container.
pub struct InMemoryBlobStore {
    base_url: String,
    blobs: RwLock<BTreeMap<String, StoredBlob>>,
}

impl InMemoryBlobStore {
    pub fn new(container: &str) -> Self {
        Self {
            base_url: format!("memory://{container}"),
            blobs: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobItem>> {
        Ok(self
            .blobs
            .read()
            .await
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, blob)| BlobItem {
                name: name.clone(),
                size: blob.data.len() as u64,
                content_type: Some(blob.content_type.clone()),
                last_modified: Some(blob.modified),
                creation_time: Some(blob.created),
            })
            .collect())
    }

    async fn download(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(name)
            .map(|b| b.data.clone())
            .ok_or_else(|| AssistantError::upstream(404, format!("The specified blob does not exist: {name}")).into())
    }

    async fn upload(&self, name: &str, data: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        let now = Utc::now();
        let mut guard = self.blobs.write().await;
        let created = guard.get(name).map_or(now, |b| b.created);
        guard.insert(name.to_string(), StoredBlob {
            data,
            content_type: content_type.to_string(),
            created,
            modified: now,
        });
        Ok(())
    }

    async fn exists(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.blobs.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.blobs.write().await.remove(name).is_some())
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }

    fn read_sas_url(&self, name: &str, expiry_minutes: i64) -> Result<String, AssistantError> {
        let expiry = Utc::now() + Duration::minutes(expiry_minutes);
        Ok(format!(
            "{}?se={}&sp=r",
            self.url(name),
            urlencoding::encode(&expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_list_delete() {
        let store = InMemoryBlobStore::new("docs");
        store.upload("sop/a.pdf", b"%PDF-a".to_vec(), "application/pdf").await.unwrap();
        store.upload("hr/b.pdf", b"b".to_vec(), "application/pdf").await.unwrap();

        let sop = store.list("sop/").await.unwrap();
        assert_eq!(sop.len(), 1);
        assert_eq!(sop[0].size, 6);
        assert_eq!(sop[0].content_type.as_deref(), Some("application/pdf"));
        assert_eq!(store.list("").await.unwrap().len(), 2);

        assert_eq!(store.download("sop/a.pdf").await.unwrap(), b"%PDF-a");
        assert!(store.download("missing").await.is_err());

        assert!(store.delete("sop/a.pdf").await.unwrap());
        assert!(!store.delete("sop/a.pdf").await.unwrap());
        assert!(!store.exists("sop/a.pdf").await.unwrap());
        assert_eq!(store.url("hr/b.pdf"), "memory://docs/hr/b.pdf");
        assert!(store.read_sas_url("hr/b.pdf", 5).unwrap().contains("sp=r"));
    }
}
