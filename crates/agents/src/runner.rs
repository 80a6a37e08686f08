use std::sync::Arc;

use {
    assistant_common::AssistantError,
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::{
    model::{CompletionResponse, LlmProvider, ToolCall},
    tool_registry::ToolRegistry,
};

/// Answer returned when the loop runs out of iterations.
pub const ITERATION_LIMIT_ANSWER: &str = "Agent stopped due to iteration limit or time limit.";

/// One executed tool call, as reported back to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub tool: String,
    pub tool_input: serde_json::Value,
    pub log: String,
    pub observation: String,
}

/// Result of running the agent loop.
#[derive(Debug)]
pub struct AgentRunResult {
    pub text: String,
    pub iterations: usize,
    pub tool_calls_made: usize,
    pub steps: Vec<AgentStep>,
}

impl AgentRunResult {
    /// Distinct tool names in call order.
    pub fn tools_used(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for step in &self.steps {
            if !names.contains(&step.tool) {
                names.push(step.tool.clone());
            }
        }
        names
    }
}

fn observation_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn step_log(tc: &ToolCall, text: Option<&str>) -> String {
    let invoking = format!("Invoking: `{}` with `{}`", tc.name, tc.arguments);
    match text {
        Some(t) if !t.trim().is_empty() => format!("{t}\n{invoking}"),
        _ => invoking,
    }
}

/// Run the agent loop: send messages to the LLM, execute tool calls, repeat.
///
/// `history` holds earlier `{role, content}` messages placed between the
/// system prompt and the new user message. Tool failures are fed back to the
/// model as observations, except authentication failures which end the run.
pub async fn run_agent_loop(
    provider: Arc<dyn LlmProvider>,
    tools: &ToolRegistry,
    system_prompt: &str,
    history: &[serde_json::Value],
    user_message: &str,
    max_iterations: usize,
) -> anyhow::Result<AgentRunResult> {
    let tool_schemas = tools.list_schemas();

    let mut messages: Vec<serde_json::Value> = Vec::with_capacity(history.len() + 2);
    messages.push(serde_json::json!({
        "role": "system",
        "content": system_prompt,
    }));
    messages.extend(history.iter().cloned());
    messages.push(serde_json::json!({
        "role": "user",
        "content": user_message,
    }));

    let mut steps: Vec<AgentStep> = Vec::new();
    let mut iterations = 0;

    loop {
        iterations += 1;
        if iterations > max_iterations {
            warn!(max_iterations, "agent loop exceeded max iterations");
            return Ok(AgentRunResult {
                text: ITERATION_LIMIT_ANSWER.to_string(),
                iterations: max_iterations,
                tool_calls_made: steps.len(),
                steps,
            });
        }

        debug!(iteration = iterations, provider = provider.name(), "calling LLM");

        let response: CompletionResponse = provider.complete(&messages, &tool_schemas).await?;

        // If no tool calls, return the text response.
        if response.tool_calls.is_empty() {
            let text = response.text.unwrap_or_default();

            info!(iterations, tool_calls = steps.len(), "agent loop complete");
            return Ok(AgentRunResult {
                text,
                iterations,
                tool_calls_made: steps.len(),
                steps,
            });
        }

        // Append assistant message with tool calls.
        let tool_calls_json: Vec<serde_json::Value> = response
            .tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string(),
                    }
                })
            })
            .collect();

        let mut assistant_msg = serde_json::json!({
            "role": "assistant",
            "tool_calls": tool_calls_json,
        });
        if let Some(ref text) = response.text {
            assistant_msg["content"] = serde_json::Value::String(text.clone());
        }
        messages.push(assistant_msg);

        // Execute each tool call.
        for tc in &response.tool_calls {
            let observation = match tools.get(&tc.name) {
                Some(tool) => match tool.execute(tc.arguments.clone()).await {
                    Ok(val) => observation_text(&val),
                    Err(e) if AssistantError::is_auth(&e) => {
                        warn!(tool = %tc.name, "tool reported missing authentication");
                        return Err(e);
                    },
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "tool execution failed");
                        format!("Error: {e}")
                    },
                },
                None => {
                    warn!(tool = %tc.name, "unknown tool");
                    format!("{} is not a valid tool, try one of [{}].", tc.name, tools.names().join(", "))
                },
            };

            messages.push(serde_json::json!({
                "role": "tool",
                "tool_call_id": tc.id,
                "content": observation,
            }));
            steps.push(AgentStep {
                tool: tc.name.clone(),
                tool_input: tc.arguments.clone(),
                log: step_log(tc, response.text.as_deref()),
                observation,
            });
        }
    }
}
