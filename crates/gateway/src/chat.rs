//! Top-level assistant chat and the admin indexing trigger.

use std::sync::Arc;

use {
    assistant_agents::{AgentRunResult, AgentStep, prompt::build_system_prompt, run_agent_loop},
    assistant_rag::IndexReport,
    assistant_tools::assistant_tools,
    axum::{Json, extract::State},
    serde::{Deserialize, Serialize},
    tracing::{error, info},
};

use crate::{
    error::{ApiError, ApiResult},
    state::GatewayState,
};

const MAX_ITERATIONS: usize = 15;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub tool_calls: Vec<AgentStep>,
}

/// One turn of the top-level assistant for `user_id`, with that user's
/// recent exchanges as history.
pub async fn run_chat(state: &GatewayState, user_id: &str, message: &str) -> anyhow::Result<AgentRunResult> {
    let tools = assistant_tools(&state.tools, user_id);
    let system = build_system_prompt(&tools);
    let history = state.conversations.history(user_id);

    let result = run_agent_loop(Arc::clone(&state.llm), &tools, &system, &history, message, MAX_ITERATIONS).await?;
    info!(
        user_id,
        iterations = result.iterations,
        tool_calls = result.tool_calls_made,
        "chat answered"
    );
    state.conversations.push_exchange(user_id, message, &result.text);
    Ok(result)
}

pub async fn chat(State(state): State<Arc<GatewayState>>, Json(req): Json<ChatRequest>) -> ApiResult<Json<ChatResponse>> {
    match run_chat(&state, &req.user_id, &req.message).await {
        Ok(result) => Ok(Json(ChatResponse {
            answer: result.text,
            tool_calls: result.steps,
        })),
        Err(e) => {
            error!(user_id = %req.user_id, error = %e, "chat failed");
            let detail = if state.debug { format!("{e:?}") } else { e.to_string() };
            Err(ApiError::internal(detail))
        },
    }
}

fn default_prefix() -> String {
    "sop/".into()
}

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

/// Full index of every blob under the prefix.
pub async fn admin_index(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<IndexRequest>,
) -> ApiResult<Json<IndexReport>> {
    let documents = state.documents()?;
    let report = documents
        .index_all(&req.prefix)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{ScriptedLlm, json_request, send, state_with},
        assistant_agents::ToolCall,
        axum::http::StatusCode,
        serde_json::json,
    };

    #[tokio::test]
    async fn chat_reports_tool_steps_and_keeps_history() {
        let llm = ScriptedLlm::new(vec![
            ScriptedLlm::tool_turn(ToolCall {
                id: "call_1".into(),
                name: "notify".into(),
                arguments: json!({"channel": "teams", "title": "Rapat", "message": "Jam 2"}),
            }),
            ScriptedLlm::text_turn("Pengingat belum bisa dikirim."),
        ]);
        let state = state_with(llm, |_| {});

        let (status, body) = send(&state, json_request("POST", "/chat", json!({
            "user_id": "alice",
            "message": "Ingatkan tim soal rapat"
        })))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Pengingat belum bisa dikirim.");
        assert_eq!(body["tool_calls"][0]["tool"], "notify");
        assert_eq!(
            body["tool_calls"][0]["observation"],
            "Notification webhook belum dikonfigurasi."
        );
        assert_eq!(state.conversations.history("alice").len(), 2);
    }

    #[tokio::test]
    async fn chat_failure_is_a_500_detail() {
        let state = state_with(ScriptedLlm::new(vec![]), |_| {});
        let (status, body) = send(&state, json_request("POST", "/chat", json!({
            "user_id": "bob",
            "message": "halo"
        })))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "script exhausted");
    }

    #[tokio::test]
    async fn admin_index_needs_document_backends() {
        let state = state_with(ScriptedLlm::new(vec![]), |_| {});
        let (status, body) = send(&state, json_request("POST", "/admin/index", json!({}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"], "Document management not available");
    }
}
