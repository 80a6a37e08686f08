use std::sync::Arc;

use {
    assistant_agents::AgentTool,
    assistant_rag::RagService,
    async_trait::async_trait,
    serde_json::{Value, json},
};

/// Internal document Q&A over the RAG index.
pub struct QnaTool {
    rag: Arc<RagService>,
    user_id: String,
}

impl QnaTool {
    pub fn new(rag: Arc<RagService>, user_id: impl Into<String>) -> Self {
        Self {
            rag,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl AgentTool for QnaTool {
    fn name(&self) -> &str {
        "qna_internal"
    }

    fn description(&self) -> &str {
        "Comprehensive Q&A system for ALL internal documents via the vector index with conversation memory. \
         Handles any document type (SOPs, procedures, policies, handbooks, reports, etc.) with efficient \
         retrieval while maintaining high accuracy and completeness. Includes conversation history for \
         context-aware responses and document counting based on unique sources."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The question about internal documents"
                },
                "user_id": {
                    "type": "string",
                    "description": "User whose conversation history should be used"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing 'query' parameter"))?;
        let user_id = params
            .get("user_id")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.user_id);
        Ok(Value::String(self.rag.answer(query, user_id, None).await?))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        assistant_agents::{CompletionResponse, LlmProvider},
        assistant_rag::{EmbeddingProvider, InMemoryVectorStore, NO_RESULTS_ANSWER},
    };

    struct FlatEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FlatEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn model_name(&self) -> &str {
            "flat"
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct SilentLlm;

    #[async_trait]
    impl LlmProvider for SilentLlm {
        fn name(&self) -> &str {
            "silent"
        }

        fn id(&self) -> &str {
            "silent"
        }

        async fn complete(&self, _: &[Value], _: &[Value]) -> anyhow::Result<CompletionResponse> {
            anyhow::bail!("not expected")
        }
    }

    #[tokio::test]
    async fn empty_index_answers_without_the_model() {
        let rag = RagService::new(
            Arc::new(FlatEmbedder),
            Arc::new(InMemoryVectorStore::new("docs", 2)),
            Arc::new(SilentLlm),
            None,
        );
        let tool = QnaTool::new(Arc::new(rag), "default_user");
        let out = tool.execute(json!({"query": "Berapa hari cuti tahunan?"})).await.unwrap();
        assert_eq!(out, json!(NO_RESULTS_ANSWER));

        let err = tool.execute(json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "missing 'query' parameter");
    }
}
