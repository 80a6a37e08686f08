//! Retrieval-augmented answering over the internal document index.

use std::sync::Arc;

use {
    assistant_agents::LlmProvider,
    assistant_memory::{ConversationMemory, Module},
    serde_json::json,
    tracing::{debug, info, warn},
};

use crate::{
    embeddings::EmbeddingProvider,
    prompt::{build_context, build_system_prompt, detect_language, documents_info},
    query::is_document_listing_query,
    rerank::{RetrievedChunk, rerank},
    vector_store::VectorStore,
};

pub const NO_RESULTS_ANSWER: &str = "Maaf, tidak ada informasi yang relevan di basis dokumen internal.";

const MEMORY_CONTEXT_TOKENS: usize = 1000;

pub struct RagService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmProvider>,
    memory: Option<Arc<ConversationMemory>>,
    default_max_docs: usize,
}

impl RagService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmProvider>,
        memory: Option<Arc<ConversationMemory>>,
    ) -> Self {
        Self {
            embedder,
            store,
            llm,
            memory,
            default_max_docs: 10,
        }
    }

    pub fn with_max_docs(mut self, max_docs: usize) -> Self {
        self.default_max_docs = max_docs.max(1);
        self
    }

    pub fn default_max_docs(&self) -> usize {
        self.default_max_docs
    }

    /// Vector search for `max_docs + 2` (at most 15) candidates, then rerank
    /// down to `max_docs`.
    pub async fn retrieve(&self, query: &str, max_docs: usize) -> anyhow::Result<Vec<RetrievedChunk>> {
        let k = (max_docs + 2).min(15);
        let vector = self.embedder.embed(query).await?;
        let hits = self.store.search(&vector, k).await?;
        debug!(candidates = hits.len(), k, "retrieved chunks");
        let chunks = hits.into_iter().map(RetrievedChunk::from).collect();
        Ok(rerank(chunks, query, max_docs))
    }

    async fn remember(&self, user_id: &str, query: &str, answer: &str, metadata: Option<serde_json::Value>) {
        if let Some(memory) = &self.memory {
            memory.add_message(user_id, "user", query, None, Module::Rag).await;
            memory
                .add_message(user_id, "assistant", answer, metadata, Module::Rag)
                .await;
        }
    }

    /// Answer `query` from the indexed documents, with the user's recent
    /// document conversation as extra context.
    pub async fn answer(&self, query: &str, user_id: &str, max_docs: Option<usize>) -> anyhow::Result<String> {
        let history = match &self.memory {
            Some(memory) => {
                memory
                    .conversation_context(user_id, MEMORY_CONTEXT_TOKENS, Module::Rag)
                    .await
            },
            None => String::new(),
        };

        let listing = is_document_listing_query(query);
        let mut max_docs = max_docs.unwrap_or(self.default_max_docs);
        if listing {
            max_docs = (max_docs * 2).min(20);
            debug!(max_docs, "document listing query, widening retrieval");
        }

        let chunks = match self.retrieve(query, max_docs).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "retrieval failed, answering without documents");
                Vec::new()
            },
        };
        if chunks.is_empty() {
            self.remember(user_id, query, NO_RESULTS_ANSWER, None).await;
            return Ok(NO_RESULTS_ANSWER.to_string());
        }

        let info = documents_info(&chunks);
        let context = build_context(&chunks, &info, listing);
        let lang = detect_language(query);
        let mut system = build_system_prompt(lang, query, &chunks, &info);
        if !history.is_empty() {
            system.push_str(&format!(
                "\n\n=== CONVERSATION HISTORY (For Context) ===\n{history}\n=== END CONVERSATION HISTORY ===\n\n\
                 Note: Use this conversation history to understand context and maintain continuity, \
                 but prioritize information from the retrieved documents for factual answers."
            ));
        }
        if listing {
            info!(
                documents = info.unique_document_count,
                chunks = info.total_chunks,
                "answering document listing query"
            );
        }

        let answer = self
            .llm
            .chat(&system, &format!("Question: {query}\n\nContext:\n{context}"))
            .await?;

        self.remember(
            user_id,
            query,
            &answer,
            Some(json!({
                "sources": info.unique_sources,
                "num_documents": info.unique_document_count,
                "num_chunks": info.total_chunks,
            })),
        )
        .await;
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        super::*,
        crate::vector_store::{InMemoryVectorStore, Point},
        assistant_agents::{CompletionResponse, Usage},
        assistant_memory::{InMemoryArchive, InMemoryHistoryCache},
        async_trait::async_trait,
        serde_json::Value,
    };

    /// Embeds by counting a few marker words, so similar texts land close.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            let t = text.to_lowercase();
            Ok(["cuti", "gaji", "dokumen"]
                .iter()
                .map(|w| t.matches(w).count() as f32 + 0.01)
                .collect())
        }

        fn model_name(&self) -> &str {
            "keyword"
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("HTTP 503: embeddings down")
        }

        fn model_name(&self) -> &str {
            "down"
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    struct RecordingLlm {
        seen: Mutex<Vec<Vec<Value>>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        fn name(&self) -> &str {
            "recording"
        }

        fn id(&self) -> &str {
            "recording"
        }

        async fn complete(&self, messages: &[Value], _tools: &[Value]) -> anyhow::Result<CompletionResponse> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(CompletionResponse {
                text: Some("Cuti tahunan adalah 12 hari.".into()),
                tool_calls: vec![],
                usage: Usage::default(),
            })
        }
    }

    fn memory() -> Arc<ConversationMemory> {
        Arc::new(ConversationMemory::new(
            Arc::new(InMemoryHistoryCache::new()),
            Arc::new(InMemoryArchive::new()),
            3600,
            10,
        ))
    }

    async fn service(points: Vec<Point>, memory: Option<Arc<ConversationMemory>>) -> (RagService, Arc<RecordingLlm>) {
        let store = Arc::new(InMemoryVectorStore::new("docs", 3));
        store.upsert(points).await.unwrap();
        let llm = Arc::new(RecordingLlm { seen: Mutex::new(vec![]) });
        (RagService::new(Arc::new(KeywordEmbedder), store, llm.clone(), memory), llm)
    }

    fn point(id: &str, vector: [f32; 3], content: &str, source: &str) -> Point {
        Point {
            id: id.into(),
            vector: vector.to_vec(),
            payload: json!({
                "page_content": content,
                "metadata": {"source": source, "content_type": "heading", "section_header": "Cuti"},
            }),
        }
    }

    #[tokio::test]
    async fn empty_index_answers_sorry_and_remembers() {
        let mem = memory();
        let (svc, llm) = service(vec![], Some(mem.clone())).await;
        let answer = svc.answer("berapa hari cuti?", "u1", None).await.unwrap();
        assert_eq!(answer, NO_RESULTS_ANSWER);
        assert!(llm.seen.lock().unwrap().is_empty());

        let history = mem.recent_history("u1", None, Module::Rag).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, NO_RESULTS_ANSWER);
    }

    #[tokio::test]
    async fn retrieval_failure_answers_sorry_and_remembers() {
        let mem = memory();
        let llm = Arc::new(RecordingLlm { seen: Mutex::new(vec![]) });
        let store = Arc::new(InMemoryVectorStore::new("docs", 3));
        let svc = RagService::new(Arc::new(DownEmbedder), store, llm.clone(), Some(mem.clone()));

        let answer = svc.answer("berapa hari cuti?", "u1", None).await.unwrap();
        assert_eq!(answer, NO_RESULTS_ANSWER);
        assert!(llm.seen.lock().unwrap().is_empty());

        let history = mem.recent_history("u1", None, Module::Rag).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "berapa hari cuti?");
        assert_eq!(history[1].content, NO_RESULTS_ANSWER);
    }

    #[tokio::test]
    async fn answers_with_context_and_saves_sources() {
        let mem = memory();
        mem.add_message("u1", "user", "halo", None, Module::Rag).await;
        let (svc, llm) = service(
            vec![
                point("a", [3.0, 0.0, 0.0], "Cuti tahunan 12 hari kerja", "sop/hr/Handbook.pdf"),
                point("b", [0.0, 2.0, 0.0], "Gaji dibayar tanggal 25", "sop/finance/Payroll.pdf"),
            ],
            Some(mem.clone()),
        )
        .await;

        let answer = svc.answer("berapa hari cuti tahunan?", "u1", Some(1)).await.unwrap();
        assert_eq!(answer, "Cuti tahunan adalah 12 hari.");

        let seen = llm.seen.lock().unwrap();
        let system = seen[0][0]["content"].as_str().unwrap();
        assert!(system.starts_with("Anda adalah asisten ahli dokumen internal"));
        assert!(system.contains("=== CONVERSATION HISTORY (For Context) ===\nUSER: halo\n=== END CONVERSATION HISTORY ==="));
        let user = seen[0][1]["content"].as_str().unwrap();
        assert_eq!(
            user,
            "Question: berapa hari cuti tahunan?\n\nContext:\n[SUMBER: sop/hr/Handbook.pdf | TIPE: heading | BAGIAN: Cuti]\nCuti tahunan 12 hari kerja"
        );
        drop(seen);

        let history = mem.recent_history("u1", None, Module::Rag).await;
        assert_eq!(history.len(), 3);
        let meta = &history[2].metadata;
        assert_eq!(meta["sources"], json!(["sop/hr/Handbook.pdf"]));
        assert_eq!(meta["num_documents"], 1);
    }

    #[tokio::test]
    async fn listing_query_includes_document_summary() {
        let (svc, llm) = service(
            vec![
                point("a", [1.0, 0.0, 1.0], "Cuti", "sop/hr/Handbook.pdf"),
                point("b", [0.0, 1.0, 1.0], "Gaji", "sop/finance/Payroll.pdf"),
            ],
            None,
        )
        .await;
        svc.answer("berapa dokumen yang ada", "u2", None).await.unwrap();
        let seen = llm.seen.lock().unwrap();
        let user = seen[0][1]["content"].as_str().unwrap();
        assert!(user.contains("Jumlah dokumen unik yang tersedia: 2\n\nDaftar semua dokumen:\n1. Payroll\n2. Handbook\n"));
    }
}
