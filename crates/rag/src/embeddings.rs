//! Embedding providers.

use {
    assistant_common::AssistantError,
    assistant_config::AzureOpenAiConfig,
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts.
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The deployment or model name (e.g. "text-embedding-3-large").
    fn model_name(&self) -> &str;

    /// The dimensionality of the embeddings produced.
    fn dimensions(&self) -> usize;
}

/// Azure OpenAI embeddings deployment.
pub struct AzureEmbeddingProvider {
    client: reqwest::Client,
    api_key: Secret<String>,
    endpoint: String,
    deployment: String,
    api_version: String,
    dims: usize,
    batch_size: usize,
}

impl AzureEmbeddingProvider {
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        api_key: Secret<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: deployment.into(),
            api_version: api_version.into(),
            dims: 3072,
            batch_size: 32,
        }
    }

    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dims = dims;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn from_config(config: &AzureOpenAiConfig) -> Result<Self, AssistantError> {
        let key = config
            .api_key
            .clone()
            .filter(|_| !config.endpoint.is_empty())
            .ok_or(AssistantError::NotConfigured("Azure OpenAI"))?;
        Ok(Self::new(
            config.endpoint.clone(),
            config.embed_deployment.clone(),
            config.api_version.clone(),
            key,
        )
        .with_dimensions(config.embed_dimensions)
        .with_batch_size(config.embed_batch_size))
    }

    async fn request(&self, input: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let url = format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.endpoint, self.deployment, self.api_version
        );
        let resp = self
            .client
            .post(url)
            .header("api-key", self.api_key.expose_secret())
            .json(&EmbeddingRequest { input })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AssistantError::upstream(status.as_u16(), body).into());
        }

        let mut data = resp.json::<EmbeddingResponse>().await?.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for AzureEmbeddingProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(size = batch.len(), deployment = %self.deployment, "embedding batch");
            out.extend(self.request(batch).await?);
        }
        if out.len() != texts.len() {
            anyhow::bail!("expected {} embeddings, got {}", texts.len(), out.len());
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        &self.deployment
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher};

    #[tokio::test]
    async fn batches_requests_and_orders_by_index() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", Matcher::Regex("^/openai/deployments/emb/embeddings".into()))
            .match_header("api-key", "k")
            .match_body(Matcher::PartialJson(serde_json::json!({"input": ["a", "b"]})))
            .with_status(200)
            .with_body(r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#)
            .create_async()
            .await;
        let second = server
            .mock("POST", Matcher::Regex("^/openai/deployments/emb/embeddings".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({"input": ["c"]})))
            .with_status(200)
            .with_body(r#"{"data":[{"index":0,"embedding":[0.5,0.5]}]}"#)
            .create_async()
            .await;

        let provider = AzureEmbeddingProvider::new(server.url(), "emb", "2024-05-01-preview", Secret::new("k".into()))
            .with_batch_size(2)
            .with_dimensions(2);
        let vectors = provider
            .embed_batch(&["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]);
        assert_eq!(provider.dimensions(), 2);
    }

    #[tokio::test]
    async fn http_error_is_upstream() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(401)
            .with_body("bad key")
            .create_async()
            .await;
        let provider = AzureEmbeddingProvider::new(server.url(), "emb", "v", Secret::new("k".into()));
        let err = provider.embed("x").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 401: bad key");
    }
}
