use std::sync::Arc;

use {
    assistant_agents::AgentTool,
    assistant_common::AssistantError,
    assistant_rag::BlobStore,
    async_trait::async_trait,
    serde_json::{Value, json},
    tracing::warn,
};

const DEFAULT_EXPIRY_MINUTES: i64 = 60;

const NO_ACCOUNT_KEY: &str = "Gagal membuat SAS: tidak ada account key pada credential. \
                              Pertimbangkan User Delegation SAS atau Managed Identity.";

/// Temporary read link for a document or template in blob storage.
pub fn fetch_template(blobs: &dyn BlobStore, path: &str, expiry_minutes: i64) -> String {
    match blobs.read_sas_url(path, expiry_minutes) {
        Ok(url) => url,
        Err(AssistantError::NotConfigured(_)) => NO_ACCOUNT_KEY.to_string(),
        Err(e) => {
            warn!(path, error = %e, "SAS generation failed");
            format!("SAS generation failed for '{path}': {e}")
        },
    }
}

pub struct FetchTemplateTool {
    blobs: Arc<dyn BlobStore>,
}

impl FetchTemplateTool {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }
}

#[async_trait]
impl AgentTool for FetchTemplateTool {
    fn name(&self) -> &str {
        "fetch_template"
    }

    fn description(&self) -> &str {
        "Buat tautan unduh sementara (SAS) untuk dokumen/template di Blob Storage."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Blob path, e.g. templates/contract.docx"
                },
                "expiry_minutes": {
                    "type": "integer",
                    "description": "Link lifetime in minutes (default 60)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let path = params
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing 'path' parameter"))?;
        let expiry = params
            .get("expiry_minutes")
            .and_then(|v| v.as_i64())
            .unwrap_or(DEFAULT_EXPIRY_MINUTES);
        Ok(Value::String(fetch_template(self.blobs.as_ref(), path, expiry)))
    }
}
