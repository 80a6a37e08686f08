//! Conversation memory inspection endpoints.

use std::sync::Arc;

use {
    assistant_memory::Module,
    axum::{
        Json,
        extract::{Path, Query, State},
    },
    serde::Deserialize,
    serde_json::{Value, json},
};

use crate::{error::ApiResult, state::GatewayState};

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Defaults to the document Q&A history.
    pub module: Option<Module>,
}

#[derive(Debug, Deserialize)]
pub struct ModuleParams {
    pub module: Option<Module>,
}

pub async fn history(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Value>> {
    let memory = state.memory()?;
    let history = memory
        .recent_history(&user_id, Some(params.limit), params.module.unwrap_or(Module::Rag))
        .await;
    Ok(Json(json!({
        "user_id": user_id,
        "message_count": history.len(),
        "history": history,
    })))
}

pub async fn clear_session(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
    Query(params): Query<ModuleParams>,
) -> ApiResult<Json<Value>> {
    state.memory()?.clear_session(&user_id, params.module).await;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Session cleared for user: {user_id}"),
    })))
}

pub async fn stats(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
    Query(params): Query<ModuleParams>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.memory()?.user_statistics(&user_id, params.module).await))
}
