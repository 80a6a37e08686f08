use std::{net::SocketAddr, sync::Arc};

use {
    assistant_config::AssistantConfig,
    axum::{
        Json, Router,
        http::{HeaderValue, Method, header},
        routing::{delete, get, post},
    },
    serde_json::{Value, json},
    tower_http::{cors::CorsLayer, trace::TraceLayer},
    tracing::{info, warn},
};

use crate::{chat, documents, memory, project, state::GatewayState, todo};

const SERVICE_NAME: &str = "Internal Assistant (Azure OpenAI + RAG + Planner + To-Do, SPA Compatible)";

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the HTTP router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            },
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat::chat))
        .route("/admin/index", post(chat::admin_index))
        // memory
        .route("/memory/history/{user_id}", get(memory::history))
        .route("/memory/session/{user_id}", delete(memory::clear_session))
        .route("/memory/stats/{user_id}", get(memory::stats))
        // documents
        .route("/documents", get(documents::list).delete(documents::delete_many))
        .route("/documents/upload", post(documents::upload))
        .route("/documents/inspect", get(documents::inspect))
        .route("/documents/schema", get(documents::schema))
        .route("/documents/reindex", post(documents::reindex))
        .route("/documents/{*blob_name}", delete(documents::delete_one))
        // planner
        .route("/project/login", get(project::login))
        .route("/project/auth/callback", get(project::auth_callback))
        .route("/project/status", get(project::status))
        .route("/project/logout", get(project::logout))
        .route("/projects", get(project::list_projects))
        .route("/projects/{name}", get(project::project_detail))
        // to-do
        .route("/login", get(todo::login))
        .route("/auth/callback", get(todo::auth_callback))
        .route("/todo/status", get(todo::status))
        .route("/todo/query", post(todo::query))
        .route("/todo/suggestions", get(todo::suggestions))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Wire the backends from `config` and serve until the listener fails.
pub async fn start_gateway(config: &AssistantConfig) -> anyhow::Result<()> {
    let state = GatewayState::from_config(config).await?;
    let app = build_gateway_app(Arc::clone(&state), &config.server.cors_origins);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Startup banner.
    let on_off = |enabled: bool| if enabled { "on" } else { "off" };
    let lines = [
        format!("internal-assistant v{}", state.version),
        format!("listening on http://{addr}"),
        format!("llm: {} ({})", state.llm.name(), state.llm.id()),
        format!(
            "memory: {}, documents: {}, rag: {}",
            on_off(state.memory.is_some()),
            on_off(state.documents.is_some()),
            on_off(state.tools.rag.is_some())
        ),
    ];
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": SERVICE_NAME,
    }))
}
