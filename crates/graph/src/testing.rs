use std::sync::{Arc, Mutex};

use {
    assistant_agents::{CompletionResponse, LlmProvider, ToolCall, Usage},
    assistant_memory::{ConversationMemory, InMemoryArchive, InMemoryHistoryCache},
    async_trait::async_trait,
    serde_json::Value,
};

/// Calls one tool on the first turn, then answers with fixed text.
pub(crate) struct ScriptedLlm {
    tool: String,
    arguments: Value,
    answer: String,
    pub(crate) seen: Mutex<Vec<Vec<Value>>>,
}

impl ScriptedLlm {
    pub(crate) fn calling(tool: &str, arguments: Value, answer: &str) -> Arc<Self> {
        Arc::new(Self {
            tool: tool.into(),
            arguments,
            answer: answer.into(),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// The tool result fed back to the model on turn `turn`.
    pub(crate) fn tool_observation(&self, turn: usize) -> Option<String> {
        let seen = self.seen.lock().unwrap();
        seen.get(turn)?
            .iter()
            .find(|m| m["role"] == "tool")
            .and_then(|m| m["content"].as_str().map(str::to_string))
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[Value], _tools: &[Value]) -> anyhow::Result<CompletionResponse> {
        let turn = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(messages.to_vec());
            seen.len()
        };
        if turn == 1 {
            return Ok(CompletionResponse {
                text: None,
                tool_calls: vec![ToolCall {
                    id: "call_0".into(),
                    name: self.tool.clone(),
                    arguments: self.arguments.clone(),
                }],
                usage: Usage::default(),
            });
        }
        Ok(CompletionResponse {
            text: Some(self.answer.clone()),
            tool_calls: vec![],
            usage: Usage::default(),
        })
    }
}

pub(crate) fn memory() -> Arc<ConversationMemory> {
    Arc::new(ConversationMemory::new(
        Arc::new(InMemoryHistoryCache::new()),
        Arc::new(InMemoryArchive::new()),
        3600,
        10,
    ))
}
