use {
    assistant_common::AssistantError,
    assistant_config::AzureOpenAiConfig,
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use crate::model::{CompletionResponse, LlmProvider, ToolCall, Usage};

/// Chat completions against an Azure OpenAI deployment.
pub struct AzureOpenAiProvider {
    endpoint: String,
    deployment: String,
    api_version: String,
    api_key: Secret<String>,
    temperature: f32,
    client: reqwest::Client,
}

impl AzureOpenAiProvider {
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        api_key: Secret<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: deployment.into(),
            api_version: api_version.into(),
            api_key,
            temperature: 0.2,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Chat provider for the configured chat deployment.
    pub fn from_config(config: &AzureOpenAiConfig) -> Result<Self, AssistantError> {
        let key = config
            .api_key
            .clone()
            .filter(|_| !config.endpoint.is_empty())
            .ok_or(AssistantError::NotConfigured("Azure OpenAI"))?;
        Ok(Self::new(
            config.endpoint.clone(),
            config.deployment.clone(),
            config.api_version.clone(),
            key,
        )
        .with_temperature(config.temperature))
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

fn parse_tool_calls(message: &serde_json::Value) -> Vec<ToolCall> {
    let Some(calls) = message["tool_calls"].as_array() else {
        return Vec::new();
    };
    calls
        .iter()
        .filter_map(|tc| {
            let name = tc["function"]["name"].as_str()?;
            let raw = tc["function"]["arguments"].as_str().unwrap_or("{}");
            let arguments = serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
            Some(ToolCall {
                id: tc["id"].as_str().unwrap_or_default().to_string(),
                name: name.to_string(),
                arguments,
            })
        })
        .collect()
}

#[async_trait]
impl LlmProvider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        "azure-openai"
    }

    fn id(&self) -> &str {
        &self.deployment
    }

    async fn complete(
        &self,
        messages: &[serde_json::Value],
        tools: &[serde_json::Value],
    ) -> anyhow::Result<CompletionResponse> {
        let mut body = serde_json::json!({
            "messages": messages,
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::Value::Array(tools.to_vec());
            body["tool_choice"] = "auto".into();
        }

        debug!(deployment = %self.deployment, messages = messages.len(), tools = tools.len(), "azure openai request");

        let resp = self
            .client
            .post(self.url())
            .header("api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            return Err(AssistantError::upstream(status.as_u16(), message).into());
        }

        let resp: serde_json::Value = resp.json().await?;
        let message = &resp["choices"][0]["message"];
        let text = message["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let usage = Usage {
            input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(CompletionResponse {
            text,
            tool_calls: parse_tool_calls(message),
            usage,
        })
    }
}
