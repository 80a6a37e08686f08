use std::time::Duration;

use {
    assistant_agents::AgentTool,
    async_trait::async_trait,
    serde::Serialize,
    serde_json::{Value, json},
    tracing::{info, warn},
};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct Notification<'a> {
    channel: &'a str,
    title: &'a str,
    message: &'a str,
}

/// Posts notifications and reminders to a webhook (Teams or email through
/// Logic Apps). Outcomes are reported as text, never as errors.
pub struct Notifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub async fn send(&self, channel: &str, title: &str, message: &str) -> String {
        let Some(url) = &self.webhook_url else {
            return "Notification webhook belum dikonfigurasi.".into();
        };
        let payload = Notification { channel, title, message };
        let resp = self
            .http
            .post(url)
            .json(&payload)
            .timeout(WEBHOOK_TIMEOUT)
            .send()
            .await;
        match resp {
            Ok(r) if r.status().is_success() => {
                info!(channel, title, "notification sent");
                "Notification sent.".into()
            },
            Ok(r) => {
                let status = r.status().as_u16();
                let body = r.text().await.unwrap_or_default();
                warn!(channel, status, "notification webhook rejected the request");
                format!("Failed: {status} {body}")
            },
            Err(e) => {
                warn!(channel, error = %e, "notification webhook unreachable");
                format!("Failed: {e}")
            },
        }
    }
}

#[async_trait]
impl AgentTool for Notifier {
    fn name(&self) -> &str {
        "notify"
    }

    fn description(&self) -> &str {
        "Kirim notifikasi/pengingat melalui webhook (Teams/Email via Logic Apps)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": {"type": "string", "description": "Target channel, e.g. teams or email"},
                "title": {"type": "string", "description": "Notification title"},
                "message": {"type": "string", "description": "Notification body"}
            },
            "required": ["channel", "title", "message"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let field = |key: &str| {
            params
                .get(key)
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("missing '{key}' parameter"))
        };
        let out = self.send(field("channel")?, field("title")?, field("message")?).await;
        Ok(Value::String(out))
    }
}
