//! Bearer-authenticated Microsoft Graph requests on behalf of a user.

use std::sync::Arc;

use {
    assistant_common::AssistantError,
    assistant_oauth::DelegatedSession,
    reqwest::Method,
    secrecy::ExposeSecret,
    serde_json::{Value, json},
    tracing::{debug, warn},
};

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<DelegatedSession>,
}

impl GraphClient {
    pub fn new(session: Arc<DelegatedSession>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GRAPH_BASE_URL.to_string(),
            session,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn session(&self) -> &Arc<DelegatedSession> {
        &self.session
    }

    /// Send a request to `path` (relative to the v1.0 root).
    ///
    /// Error statuses become `HTTP {status}: {error.message}`; a 401 also
    /// logs the user out. DELETE and 204 responses yield `{"success": true}`.
    pub async fn request(&self, user_id: &str, method: Method, path: &str, body: Option<&Value>) -> anyhow::Result<Value> {
        let token = self.session.access_token(user_id).await?;
        let url = format!("{}{path}", self.base_url);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status.as_u16() >= 400 {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .map(|v| match v["error"]["message"].as_str() {
                    Some(m) => m.to_string(),
                    None => v.to_string(),
                })
                .unwrap_or(text);
            if status.as_u16() == 401 {
                warn!(provider = self.session.provider(), user_id, "graph rejected token, logging out");
                self.session.logout(user_id);
            }
            return Err(AssistantError::upstream(status.as_u16(), detail).into());
        }

        debug!(%method, path, status = status.as_u16(), "graph request ok");
        if method == Method::DELETE || status.as_u16() == 204 {
            return Ok(json!({"success": true}));
        }
        Ok(resp.json().await?)
    }

    pub async fn get(&self, user_id: &str, path: &str) -> anyhow::Result<Value> {
        self.request(user_id, Method::GET, path, None).await
    }

    pub async fn post(&self, user_id: &str, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.request(user_id, Method::POST, path, Some(body)).await
    }

    pub async fn patch(&self, user_id: &str, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.request(user_id, Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, user_id: &str, path: &str) -> anyhow::Result<Value> {
        self.request(user_id, Method::DELETE, path, None).await
    }
}

/// The `value` array of a Graph collection response.
pub(crate) fn collection(response: &Value) -> &[Value] {
    response["value"].as_array().map(Vec::as_slice).unwrap_or_default()
}
