//! Blob → layout → chunks → embeddings → vector store.

use std::{collections::BTreeSet, sync::Arc};

use {
    serde::Serialize,
    serde_json::{Value, json},
    tracing::{error, info, warn},
    uuid::Uuid,
};

use crate::{
    blob::BlobStore,
    chunker::{Chunk, create_chunks},
    embeddings::EmbeddingProvider,
    extract::extract,
    layout::DocumentAnalyzer,
    text::safe_doc_id,
    vector_store::{Point, VectorStore},
};

const EMBED_BATCH: usize = 32;
const SCROLL_LIMIT: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub total_chunks: usize,
    pub avg_chunks_per_doc: f64,
}

impl IndexReport {
    fn finish(mut self) -> Self {
        self.avg_chunks_per_doc = self.total_chunks as f64 / self.indexed.max(1) as f64;
        self
    }
}

/// Deterministic point id of chunk `index` of `blob_name`.
pub fn chunk_point_id(blob_name: &str, index: usize) -> String {
    let key = format!("{}_{index}", safe_doc_id(blob_name));
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, key.as_bytes()).to_string()
}

enum Outcome {
    Indexed(usize),
    Skipped(&'static str),
}

pub struct Indexer {
    blobs: Arc<dyn BlobStore>,
    analyzer: Arc<dyn DocumentAnalyzer>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl Indexer {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        analyzer: Arc<dyn DocumentAnalyzer>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            blobs,
            analyzer,
            embedder,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Index every blob under `prefix` (every blob when empty).
    pub async fn index_prefix(&self, prefix: &str) -> anyhow::Result<IndexReport> {
        info!(prefix, "indexing documents");
        let names: Vec<String> = self.blobs.list(prefix).await?.into_iter().map(|b| b.name).collect();
        let mut report = IndexReport::default();
        for name in &names {
            self.index_one(name, &mut report).await;
        }
        Ok(report.finish())
    }

    /// Index the given blobs; names that do not exist are skipped.
    pub async fn index_blobs(&self, names: &[String]) -> IndexReport {
        let mut report = IndexReport::default();
        for name in names {
            match self.blobs.exists(name).await {
                Ok(true) => self.index_one(name, &mut report).await,
                Ok(false) => {
                    warn!(blob = %name, "blob does not exist, skipping");
                    report.skipped += 1;
                },
                Err(e) => report.errors.push(format!("{name}: {e}")),
            }
        }
        report.finish()
    }

    async fn index_one(&self, name: &str, report: &mut IndexReport) {
        match self.process(name).await {
            Ok(Outcome::Indexed(chunks)) => {
                info!(blob = name, chunks, "indexed document");
                report.indexed += 1;
                report.total_chunks += chunks;
            },
            Ok(Outcome::Skipped(reason)) => {
                info!(blob = name, reason, "skipped document");
                report.skipped += 1;
            },
            Err(e) => {
                error!(blob = name, error = %e, "failed to process document");
                report.errors.push(format!("{name}: {e}"));
            },
        }
    }

    async fn process(&self, name: &str) -> anyhow::Result<Outcome> {
        let bytes = self.blobs.download(name).await?;
        let layout = self.analyzer.analyze(bytes).await?;
        let doc = extract(&layout);
        if doc.is_empty() {
            return Ok(Outcome::Skipped("no content extracted"));
        }
        let chunks = create_chunks(&doc);
        if chunks.is_empty() {
            return Ok(Outcome::Skipped("no chunks created"));
        }

        let total = chunks.len();
        let numbered: Vec<(usize, Chunk)> = chunks.into_iter().enumerate().collect();
        let mut stored = 0;
        for batch in numbered.chunks(EMBED_BATCH) {
            for ((i, chunk), vector) in self.embed_chunks(name, batch).await {
                let point = Point {
                    id: chunk_point_id(name, *i),
                    vector,
                    payload: chunk_payload(name, *i, total, chunk),
                };
                match self.store.upsert(vec![point]).await {
                    Ok(()) => stored += 1,
                    Err(e) => error!(blob = name, chunk = i, error = %e, "failed to index chunk"),
                }
            }
        }
        if stored == 0 {
            anyhow::bail!("none of {total} chunks could be indexed");
        }
        Ok(Outcome::Indexed(total))
    }

    /// Embed one batch. When the batch request fails, chunks are embedded one
    /// by one and the failing ones are dropped.
    async fn embed_chunks<'a>(
        &self,
        name: &str,
        batch: &'a [(usize, Chunk)],
    ) -> Vec<(&'a (usize, Chunk), Vec<f32>)> {
        let texts: Vec<String> = batch.iter().map(|(_, c)| c.content.clone()).collect();
        match self.embedder.embed_batch(&texts).await {
            Ok(vectors) if vectors.len() == batch.len() => return batch.iter().zip(vectors).collect(),
            Ok(vectors) => {
                warn!(
                    blob = name,
                    expected = batch.len(),
                    got = vectors.len(),
                    "embedding count mismatch, retrying per chunk"
                );
            },
            Err(e) => warn!(blob = name, error = %e, "batch embedding failed, retrying per chunk"),
        }
        let mut embedded = Vec::with_capacity(batch.len());
        for item in batch {
            match self.embedder.embed(&item.1.content).await {
                Ok(vector) => embedded.push((item, vector)),
                Err(e) => error!(blob = name, chunk = item.0, error = %e, "failed to embed chunk"),
            }
        }
        embedded
    }

    /// Every source name present in the index, from `metadata.source` and a
    /// top-level `source`.
    pub async fn indexed_sources(&self) -> anyhow::Result<BTreeSet<String>> {
        let points = self.store.scroll(None, SCROLL_LIMIT).await?;
        let mut sources = BTreeSet::new();
        for p in points {
            for v in [&p.payload["source"], &p.payload["metadata"]["source"]] {
                if let Some(s) = v.as_str().filter(|s| !s.is_empty()) {
                    sources.insert(s.to_string());
                }
            }
        }
        Ok(sources)
    }
}

fn chunk_payload(source: &str, index: usize, total: usize, chunk: &Chunk) -> Value {
    let mut metadata = json!({
        "source": source,
        "chunk_index": index,
        "content_type": chunk.chunk_type,
        "token_count": chunk.tokens,
        "total_chunks": total,
    });
    if let Value::Object(map) = &mut metadata {
        map.extend(chunk.metadata.clone());
    }
    json!({"page_content": chunk.content, "metadata": metadata})
}
