use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use {
    assistant_agents::{CompletionResponse, LlmProvider, ToolCall, Usage},
    assistant_oauth::{DelegatedSession, OAuthConfig, OAuthTokens},
    assistant_rag::{
        DocumentAnalyzer, DocumentManager, EmbeddingProvider, InMemoryBlobStore, InMemoryVectorStore, Indexer,
        layout::{AnalyzedDocument, Paragraph},
    },
    async_trait::async_trait,
    axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    },
    secrecy::Secret,
    serde_json::Value,
    tower::ServiceExt,
};

use crate::{
    server::build_gateway_app,
    state::{GatewayState, Services},
};

/// Replays canned completions in order, then fails.
pub(crate) struct ScriptedLlm {
    turns: Mutex<VecDeque<CompletionResponse>>,
}

impl ScriptedLlm {
    pub(crate) fn new(turns: Vec<CompletionResponse>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
        })
    }

    pub(crate) fn text_turn(text: &str) -> CompletionResponse {
        CompletionResponse {
            text: Some(text.into()),
            tool_calls: vec![],
            usage: Usage::default(),
        }
    }

    pub(crate) fn tool_turn(call: ToolCall) -> CompletionResponse {
        CompletionResponse {
            text: None,
            tool_calls: vec![call],
            usage: Usage::default(),
        }
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

    async fn complete(&self, _messages: &[Value], _tools: &[Value]) -> anyhow::Result<CompletionResponse> {
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("script exhausted"))
    }
}

/// One paragraph per line; lines starting with `#` are titles.
struct LineAnalyzer;

#[async_trait]
impl DocumentAnalyzer for LineAnalyzer {
    async fn analyze(&self, document: Vec<u8>) -> anyhow::Result<AnalyzedDocument> {
        let text = String::from_utf8(document)?;
        Ok(AnalyzedDocument {
            paragraphs: text
                .lines()
                .map(|l| match l.strip_prefix('#') {
                    Some(title) => Paragraph {
                        content: title.trim().into(),
                        role: Some("title".into()),
                    },
                    None => Paragraph {
                        content: l.into(),
                        role: None,
                    },
                })
                .collect(),
            ..Default::default()
        })
    }
}

struct LengthEmbedder;

#[async_trait]
impl EmbeddingProvider for LengthEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![text.len() as f32, 1.0])
    }

    fn model_name(&self) -> &str {
        "length"
    }

    fn dimensions(&self) -> usize {
        2
    }
}

pub(crate) fn document_manager() -> (Arc<DocumentManager>, Arc<InMemoryBlobStore>) {
    let blobs = Arc::new(InMemoryBlobStore::new("docs"));
    let indexer = Indexer::new(
        blobs.clone(),
        Arc::new(LineAnalyzer),
        Arc::new(LengthEmbedder),
        Arc::new(InMemoryVectorStore::new("docs", 2)),
    );
    (Arc::new(DocumentManager::new(Arc::new(indexer)).with_vector_size(2)), blobs)
}

pub(crate) fn session(provider: &str, use_pkce: bool) -> Arc<DelegatedSession> {
    Arc::new(DelegatedSession::new(provider, OAuthConfig {
        client_id: "cid".into(),
        client_secret: None,
        auth_url: "https://login.example/authorize".into(),
        token_url: "https://login.example/token".into(),
        redirect_uri: "http://localhost:8001/callback".into(),
        scopes: vec!["Tasks.Read".into()],
        use_pkce,
        extra_auth_params: vec![],
    }))
}

pub(crate) fn log_in(session: &DelegatedSession, user_id: &str) {
    let now = chrono::Utc::now().timestamp() as u64;
    session.set_tokens(user_id, OAuthTokens {
        access_token: Secret::new("token".into()),
        refresh_token: None,
        received_at: now,
        expires_at: Some(now + 3600),
    });
}

pub(crate) fn state_with(llm: Arc<ScriptedLlm>, configure: impl FnOnce(&mut Services)) -> Arc<GatewayState> {
    let mut services = Services::new(llm);
    configure(&mut services);
    GatewayState::new(services, session("planner", true), session("todo", false))
}

pub(crate) fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub(crate) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Status, `Location` header and raw body text.
pub(crate) async fn send_raw(state: &Arc<GatewayState>, req: Request<Body>) -> (StatusCode, Option<String>, String) {
    let app = build_gateway_app(Arc::clone(state), &[]);
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let location = resp
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, location, String::from_utf8(bytes.to_vec()).unwrap())
}

pub(crate) async fn send(state: &Arc<GatewayState>, req: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send_raw(state, req).await;
    (status, serde_json::from_str(&body).unwrap())
}
