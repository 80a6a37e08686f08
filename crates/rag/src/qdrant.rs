//! Qdrant REST client implementing [`VectorStore`].

use {
    assistant_common::AssistantError,
    assistant_config::QdrantConfig,
    async_trait::async_trait,
    reqwest::Method,
    secrecy::{ExposeSecret, Secret},
    serde::de::DeserializeOwned,
    serde_json::{Value, json},
    tracing::{debug, info},
};

use crate::vector_store::{FieldMatch, Point, ScoredPoint, StoredPoint, VectorStore};

pub struct QdrantStore {
    client: reqwest::Client,
    url: String,
    api_key: Option<Secret<String>>,
    collection: String,
}

#[derive(serde::Deserialize)]
struct Envelope<T> {
    result: T,
}

impl QdrantStore {
    pub fn new(url: impl Into<String>, collection: impl Into<String>, api_key: Option<Secret<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            api_key,
            collection: collection.into(),
        }
    }

    pub fn from_config(config: &QdrantConfig) -> Result<Self, AssistantError> {
        if config.url.is_empty() {
            return Err(AssistantError::NotConfigured("Qdrant"));
        }
        Ok(Self::new(
            config.url.clone(),
            config.collection.clone(),
            config.api_key.clone(),
        ))
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.url, self.collection)
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, url: String, body: Option<Value>) -> anyhow::Result<T> {
        let mut req = self.client.request(method.clone(), &url);
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key.expose_secret());
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["status"]["error"].as_str().map(str::to_string))
                .unwrap_or(text);
            return Err(AssistantError::upstream(status.as_u16(), message).into());
        }
        debug!(%method, %url, "qdrant request ok");
        Ok(resp.json::<Envelope<T>>().await?.result)
    }
}

fn point_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn stored(raw: Value) -> StoredPoint {
    StoredPoint {
        id: point_id(&raw["id"]),
        payload: raw.get("payload").cloned().unwrap_or(Value::Null),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, points: Vec<Point>) -> anyhow::Result<()> {
        let body = json!({
            "points": points
                .into_iter()
                .map(|p| json!({"id": p.id, "vector": p.vector, "payload": p.payload}))
                .collect::<Vec<_>>(),
        });
        self.call::<Value>(Method::PUT, self.collection_url("/points?wait=true"), Some(body))
            .await?;
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> anyhow::Result<Vec<ScoredPoint>> {
        let hits: Vec<Value> = self
            .call(
                Method::POST,
                self.collection_url("/points/search"),
                Some(json!({"vector": vector, "limit": limit, "with_payload": true})),
            )
            .await?;
        Ok(hits
            .into_iter()
            .map(|h| ScoredPoint {
                id: point_id(&h["id"]),
                score: h["score"].as_f64().unwrap_or_default() as f32,
                payload: h.get("payload").cloned().unwrap_or(Value::Null),
            })
            .collect())
    }

    async fn scroll(&self, filter: Option<&FieldMatch>, limit: usize) -> anyhow::Result<Vec<StoredPoint>> {
        let mut body = json!({"limit": limit, "with_payload": true, "with_vector": false});
        if let Some(f) = filter {
            body["filter"] = json!({"must": [{"key": f.key, "match": {"value": f.value}}]});
        }
        let result: Value = self
            .call(Method::POST, self.collection_url("/points/scroll"), Some(body))
            .await?;
        Ok(result["points"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(stored)
            .collect())
    }

    async fn delete_points(&self, ids: &[String]) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.call::<Value>(
            Method::POST,
            self.collection_url("/points/delete?wait=true"),
            Some(json!({"points": ids})),
        )
        .await?;
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<u64> {
        let result: Value = self
            .call(Method::POST, self.collection_url("/points/count"), Some(json!({"exact": false})))
            .await?;
        Ok(result["count"].as_u64().unwrap_or_default())
    }

    async fn collection_info(&self) -> anyhow::Result<Value> {
        let result: Value = self.call(Method::GET, self.collection_url(""), None).await?;
        Ok(json!({
            "collection_name": self.collection,
            "status": result["status"],
            "points_count": result["points_count"],
            "vectors_config": result["config"]["params"]["vectors"],
        }))
    }

    async fn recreate_collection(&self, vector_size: usize) -> anyhow::Result<()> {
        match self.call::<Value>(Method::DELETE, self.collection_url(""), None).await {
            Ok(_) => info!(collection = %self.collection, "deleted collection"),
            Err(e) => debug!(collection = %self.collection, error = %e, "delete before recreate failed"),
        }
        self.call::<Value>(
            Method::PUT,
            self.collection_url(""),
            Some(json!({"vectors": {"size": vector_size, "distance": "Cosine"}})),
        )
        .await?;
        info!(collection = %self.collection, vector_size, "created collection");
        Ok(())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}
