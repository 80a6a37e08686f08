//! Planner login (public client with PKCE) and project endpoints.

use std::sync::Arc;

use {
    assistant_common::time::now_iso,
    axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
        response::{Html, IntoResponse, Redirect, Response},
    },
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::{info, warn},
};

use crate::{
    error::{ApiError, ApiResult},
    pages,
    state::{GatewayState, SESSION_USER},
};

const CLIENT_TYPE: &str = "Single-Page Application (SPA)";
const LOGIN_URL: &str = "/project/login";

const FEATURES: [&str; 4] = [
    "Project Progress Analysis",
    "Multi-Project Comparison",
    "Portfolio Overview",
    "Task Management Insights",
];

pub async fn login(State(state): State<Arc<GatewayState>>) -> ApiResult<Redirect> {
    let url = state
        .planner_session
        .begin_login(SESSION_USER)
        .map_err(|e| ApiError::internal(format!("Error building auth URL: {e}")))?;
    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub async fn auth_callback(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = &params.error {
        warn!(error = %error, description = ?params.error_description, "planner login rejected");
        let page = pages::project_oauth_error(error, params.error_description.as_deref());
        return (StatusCode::BAD_REQUEST, Html(page)).into_response();
    }
    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Html(pages::project_cancelled())).into_response();
    };

    match state
        .planner_session
        .complete_login(code, params.state.as_deref())
        .await
    {
        Ok(user_id) => {
            info!(user_id = %user_id, "planner login completed");
            Html(pages::project_success()).into_response()
        },
        Err(e) => {
            warn!(error = %e, "planner token exchange failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::project_exchange_error(&e.to_string()))).into_response()
        },
    }
}

pub async fn status(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    let authenticated = state.planner_session.is_authenticated(SESSION_USER).await;
    let status = state.projects.planner().login_status(SESSION_USER).await;
    let features: &[&str] = if authenticated { &FEATURES } else { &[] };
    Json(json!({
        "authenticated": authenticated,
        "status": status,
        "login_url": (!authenticated).then_some(LOGIN_URL),
        "client_type": CLIENT_TYPE,
        "security": "PKCE Enhanced",
        "features_available": features,
        "timestamp": now_iso(),
    }))
}

pub async fn logout(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    state.planner_session.logout(SESSION_USER);
    info!("planner session cleared");
    Json(json!({
        "status": "success",
        "message": "Successfully logged out from SPA project management",
        "client_type": "Single-Page Application",
        "login_url": LOGIN_URL,
    }))
}

fn login_required() -> Json<Value> {
    Json(json!({
        "error": "Authentication required",
        "message": "Please login first via /project/login",
        "login_url": LOGIN_URL,
        "authenticated": false,
        "client_type": CLIENT_TYPE,
    }))
}

pub async fn list_projects(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    if !state.planner_session.is_authenticated(SESSION_USER).await {
        return login_required();
    }
    let result = state
        .projects
        .query(SESSION_USER, "List all my projects with their groups and basic info")
        .await;
    Json(json!({
        "status": "success",
        "result": result,
        "authenticated": true,
        "client_type": "SPA",
        "timestamp": now_iso(),
    }))
}

pub async fn project_detail(State(state): State<Arc<GatewayState>>, Path(name): Path<String>) -> Json<Value> {
    if !state.planner_session.is_authenticated(SESSION_USER).await {
        return login_required();
    }
    let query = format!(
        "Give me detailed progress analysis of project {name} including tasks, completion rate, and any issues"
    );
    let detail = state.projects.query(SESSION_USER, &query).await;
    Json(json!({
        "status": "success",
        "project_detail": detail,
        "project_name": name,
        "authenticated": true,
        "client_type": "SPA",
        "timestamp": now_iso(),
    }))
}
