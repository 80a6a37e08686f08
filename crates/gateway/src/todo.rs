//! Microsoft To-Do login (confidential client) and the To-Do assistant.

use std::sync::Arc;

use {
    axum::{
        Json,
        extract::{Query, State},
        response::{Html, Redirect},
    },
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::info,
};

use crate::{
    error::{ApiError, ApiResult},
    pages,
    state::{GatewayState, SESSION_USER},
};

pub async fn login(State(state): State<Arc<GatewayState>>) -> ApiResult<Redirect> {
    let url = state
        .todo_session
        .begin_login(SESSION_USER)
        .map_err(|e| ApiError::internal(format!("Error building auth URL: {e}")))?;
    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

pub async fn auth_callback(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Html<String>> {
    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Error during login: missing authorization code"))?;
    let user_id = state
        .todo_session
        .complete_login(code, params.state.as_deref())
        .await
        .map_err(|e| ApiError::bad_request(format!("Error during login: {e}")))?;
    info!(user_id = %user_id, "to-do login completed");
    Ok(Html(pages::todo_success()))
}

pub async fn status(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    let authenticated = state.todo_session.is_authenticated(SESSION_USER).await;
    Json(json!({
        "authenticated": authenticated,
        "status": state.todo.login_status(SESSION_USER).await,
        "login_url": (!authenticated).then_some("/login"),
    }))
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// Microsoft account the query runs as.
    pub user_id: Option<String>,
    #[serde(default)]
    pub query: String,
}

pub async fn query(State(state): State<Arc<GatewayState>>, Json(req): Json<QueryRequest>) -> Json<Value> {
    let user_id = req.user_id.unwrap_or_else(|| SESSION_USER.to_string());
    let answer = state.todo.query(&user_id, &req.query).await;
    Json(json!({
        "user_id": user_id,
        "answer": answer,
    }))
}

pub async fn suggestions(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    Json(json!({
        "suggestions": state.todo.suggestions(SESSION_USER).await,
    }))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{ScriptedLlm, get, json_request, log_in, send, send_raw, state_with},
        assistant_graph::todo_agent::{NOT_LOGGED_IN, WELCOME},
        axum::http::StatusCode,
    };

    #[tokio::test]
    async fn empty_query_gets_help_then_login_prompt() {
        let state = state_with(ScriptedLlm::new(vec![]), |_| {});

        let (_, body) = send(&state, json_request("POST", "/todo/query", json!({"query": "  "}))).await;
        assert_eq!(body["answer"], WELCOME);
        assert_eq!(body["user_id"], "current_user");

        let (_, body) = send(&state, json_request("POST", "/todo/query", json!({
            "query": "Tampilkan semua task saya"
        })))
        .await;
        assert_eq!(body["answer"], NOT_LOGGED_IN);

        let (_, body) = send(&state, get("/todo/status")).await;
        assert_eq!(body["authenticated"], false);
        assert_eq!(body["status"], "❌ Not logged in or token expired.");
        assert_eq!(body["login_url"], "/login");
    }

    #[tokio::test]
    async fn logged_in_query_runs_the_agent() {
        let state = state_with(
            ScriptedLlm::new(vec![ScriptedLlm::text_turn("Tidak ada task yang jatuh tempo hari ini.")]),
            |_| {},
        );
        log_in(&state.todo_session, SESSION_USER);

        let (status, body) = send(&state, json_request("POST", "/todo/query", json!({
            "query": "Task apa yang deadline hari ini?"
        })))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Tidak ada task yang jatuh tempo hari ini.");

        let (_, body) = send(&state, get("/todo/status")).await;
        assert_eq!(body["authenticated"], true);
        assert!(body["login_url"].is_null());
    }

    #[tokio::test]
    async fn login_and_callback() {
        let state = state_with(ScriptedLlm::new(vec![]), |_| {});

        let (status, location, _) = send_raw(&state, get("/login")).await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert!(!location.unwrap().contains("code_challenge"));

        let (status, body) = send(&state, get("/auth/callback?code=abc&state=unknown")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["detail"],
            "Error during login: State validation failed. Possible CSRF attack."
        );
    }
}
