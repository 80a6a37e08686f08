//! Document layout analysis (paragraphs with roles, tables with cells).

use std::time::Duration;

use {
    assistant_common::AssistantError,
    assistant_config::DocIntelConfig,
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, info},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedDocument {
    #[serde(default)]
    pub pages: Vec<serde_json::Value>,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paragraph {
    pub content: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub row_count: usize,
    #[serde(default)]
    pub column_count: usize,
    #[serde(default)]
    pub cells: Vec<TableCell>,
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
}

impl Table {
    /// Page of the first bounding region.
    pub fn page_number(&self) -> Option<u32> {
        self.bounding_regions.first().map(|r| r.page_number)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    pub row_index: usize,
    pub column_index: usize,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingRegion {
    pub page_number: u32,
}

/// Turns raw document bytes into a layout.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, document: Vec<u8>) -> anyhow::Result<AnalyzedDocument>;
}

/// Azure Document Intelligence `prebuilt-layout` model.
pub struct AzureLayoutAnalyzer {
    endpoint: String,
    key: Secret<String>,
    api_version: String,
    poll_interval: Duration,
    max_polls: usize,
    client: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationStatus {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzedDocument>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl AzureLayoutAnalyzer {
    pub fn new(endpoint: impl Into<String>, key: Secret<String>, api_version: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            key,
            api_version: api_version.into(),
            poll_interval: Duration::from_secs(1),
            max_polls: 300,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &DocIntelConfig) -> Result<Self, AssistantError> {
        let key = config
            .key
            .clone()
            .filter(|_| !config.endpoint.is_empty())
            .ok_or(AssistantError::NotConfigured("Document Intelligence"))?;
        Ok(Self::new(config.endpoint.clone(), key, config.api_version.clone()))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl DocumentAnalyzer for AzureLayoutAnalyzer {
    async fn analyze(&self, document: Vec<u8>) -> anyhow::Result<AnalyzedDocument> {
        let url = format!(
            "{}/formrecognizer/documentModels/prebuilt-layout:analyze?api-version={}",
            self.endpoint, self.api_version
        );
        let resp = self
            .client
            .post(url)
            .header("Ocp-Apim-Subscription-Key", self.key.expose_secret())
            .header("Content-Type", "application/octet-stream")
            .body(document)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AssistantError::upstream(status.as_u16(), body).into());
        }
        let operation = resp
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("analyze response has no Operation-Location"))?;

        for attempt in 0..self.max_polls {
            if attempt > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }
            let op: OperationStatus = self
                .client
                .get(&operation)
                .header("Ocp-Apim-Subscription-Key", self.key.expose_secret())
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            debug!(attempt, status = %op.status, "layout analysis poll");

            match op.status.as_str() {
                "succeeded" => {
                    let doc = op.analyze_result.unwrap_or_default();
                    info!(pages = doc.pages.len(), "document intelligence extracted pages");
                    return Ok(doc);
                },
                "failed" => {
                    let detail = op.error.map(|e| e.to_string()).unwrap_or_default();
                    anyhow::bail!("layout analysis failed: {detail}");
                },
                _ => {},
            }
        }
        anyhow::bail!("layout analysis did not finish in time")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_layout_result() {
        let json = r#"{
            "pages": [{}, {}],
            "paragraphs": [{"content": "Title", "role": "title"}, {"content": "Body"}],
            "tables": [{"rowCount": 2, "columnCount": 1,
                        "cells": [{"rowIndex": 0, "columnIndex": 0, "content": "H"}],
                        "boundingRegions": [{"pageNumber": 3}]}]
        }"#;
        let doc: AnalyzedDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.paragraphs[0].role.as_deref(), Some("title"));
        assert!(doc.paragraphs[1].role.is_none());
        assert_eq!(doc.tables[0].page_number(), Some(3));
        assert_eq!(doc.tables[0].cells[0].content, "H");
    }

    #[tokio::test]
    async fn submits_and_polls_until_succeeded() {
        let mut server = mockito::Server::new_async().await;
        let op_url = format!("{}/operations/1", server.url());
        let submit = server
            .mock("POST", mockito::Matcher::Regex("prebuilt-layout:analyze".into()))
            .match_header("Ocp-Apim-Subscription-Key", "k")
            .with_status(202)
            .with_header("Operation-Location", &op_url)
            .create_async()
            .await;
        server
            .mock("GET", "/operations/1")
            .with_status(200)
            .with_body(r#"{"status":"succeeded","analyzeResult":{"paragraphs":[{"content":"Hello"}]}}"#)
            .create_async()
            .await;

        let analyzer = AzureLayoutAnalyzer::new(server.url(), Secret::new("k".into()), "2023-07-31")
            .with_poll_interval(Duration::from_millis(1));
        let doc = analyzer.analyze(b"%PDF".to_vec()).await.unwrap();
        submit.assert_async().await;
        assert_eq!(doc.paragraphs[0].content, "Hello");
    }

    #[tokio::test]
    async fn failed_operation_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let op_url = format!("{}/operations/2", server.url());
        server
            .mock("POST", mockito::Matcher::Regex("analyze".into()))
            .with_status(202)
            .with_header("Operation-Location", &op_url)
            .create_async()
            .await;
        server
            .mock("GET", "/operations/2")
            .with_status(200)
            .with_body(r#"{"status":"failed","error":{"code":"InvalidContent"}}"#)
            .create_async()
            .await;

        let analyzer = AzureLayoutAnalyzer::new(server.url(), Secret::new("k".into()), "2023-07-31");
        let err = analyzer.analyze(vec![]).await.unwrap_err();
        assert!(err.to_string().contains("InvalidContent"));
    }
}
