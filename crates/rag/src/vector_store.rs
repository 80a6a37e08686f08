//! Vector store abstraction over the document index.
//!
//! Points carry a JSON payload shaped `{page_content, metadata: {...}}`.

use std::collections::BTreeMap;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    tokio::sync::RwLock,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: String,
    #[serde(default)]
    pub payload: Value,
}

/// Exact match on a (possibly dotted) payload key, e.g. `metadata.source`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub key: String,
    pub value: String,
}

impl FieldMatch {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, payload: &Value) -> bool {
        self.key
            .split('.')
            .try_fold(payload, |v, k| v.get(k))
            .and_then(Value::as_str)
            .is_some_and(|v| v == self.value)
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, points: Vec<Point>) -> anyhow::Result<()>;

    /// Nearest neighbours by cosine similarity, best first.
    async fn search(&self, vector: &[f32], limit: usize) -> anyhow::Result<Vec<ScoredPoint>>;

    async fn scroll(&self, filter: Option<&FieldMatch>, limit: usize) -> anyhow::Result<Vec<StoredPoint>>;

    async fn delete_points(&self, ids: &[String]) -> anyhow::Result<()>;

    /// Approximate number of points.
    async fn count(&self) -> anyhow::Result<u64>;

    async fn collection_info(&self) -> anyhow::Result<Value>;

    /// Drop the collection and create it empty with `vector_size` cosine vectors.
    async fn recreate_collection(&self, vector_size: usize) -> anyhow::Result<()>;

    fn collection_name(&self) -> &str;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Brute-force store used by tests and local runs without Qdrant.
pub struct InMemoryVectorStore {
    name: String,
    vector_size: RwLock<usize>,
    points: RwLock<BTreeMap<String, Point>>,
}

impl InMemoryVectorStore {
    pub fn new(name: impl Into<String>, vector_size: usize) -> Self {
        Self {
            name: name.into(),
            vector_size: RwLock::new(vector_size),
            points: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, points: Vec<Point>) -> anyhow::Result<()> {
        let size = *self.vector_size.read().await;
        let mut guard = self.points.write().await;
        for point in points {
            if point.vector.len() != size {
                anyhow::bail!(
                    "wrong vector dimension for point {}: expected {size}, got {}",
                    point.id,
                    point.vector.len()
                );
            }
            guard.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> anyhow::Result<Vec<ScoredPoint>> {
        let guard = self.points.read().await;
        let mut scored: Vec<ScoredPoint> = guard
            .values()
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn scroll(&self, filter: Option<&FieldMatch>, limit: usize) -> anyhow::Result<Vec<StoredPoint>> {
        let guard = self.points.read().await;
        Ok(guard
            .values()
            .filter(|p| filter.is_none_or(|f| f.matches(&p.payload)))
            .take(limit)
            .map(|p| StoredPoint {
                id: p.id.clone(),
                payload: p.payload.clone(),
            })
            .collect())
    }

    async fn delete_points(&self, ids: &[String]) -> anyhow::Result<()> {
        let mut guard = self.points.write().await;
        for id in ids {
            guard.remove(id);
        }
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<u64> {
        Ok(self.points.read().await.len() as u64)
    }

    async fn collection_info(&self) -> anyhow::Result<Value> {
        Ok(json!({
            "collection_name": self.name,
            "status": "green",
            "points_count": self.points.read().await.len(),
            "vectors_config": {"size": *self.vector_size.read().await, "distance": "Cosine"},
        }))
    }

    async fn recreate_collection(&self, vector_size: usize) -> anyhow::Result<()> {
        self.points.write().await.clear();
        *self.vector_size.write().await = vector_size;
        Ok(())
    }

    fn collection_name(&self) -> &str {
        &self.name
    }
}
