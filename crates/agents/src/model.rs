use async_trait::async_trait;

/// Chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Deployment or model identifier (e.g. "gpt-4o-mini").
    fn id(&self) -> &str;

    /// One completion over OpenAI-shaped `messages`. `tools` holds function
    /// schemas; an empty slice disables tool calling.
    async fn complete(
        &self,
        messages: &[serde_json::Value],
        tools: &[serde_json::Value],
    ) -> anyhow::Result<CompletionResponse>;

    /// Single-turn helper: a system prompt and one user message.
    async fn chat(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let messages = [
            serde_json::json!({ "role": "system", "content": system }),
            serde_json::json!({ "role": "user", "content": user }),
        ];
        let resp = self.complete(&messages, &[]).await?;
        Ok(resp.text.unwrap_or_default())
    }
}

/// Response from an LLM completion call.
#[derive(Debug)]
pub struct CompletionResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
