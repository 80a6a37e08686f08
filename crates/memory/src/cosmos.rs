//! Azure Cosmos DB (SQL API) archive over the REST interface.
//!
//! Requests are signed with the account master key: HMAC-SHA256 over
//! `verb\nresourceType\nresourceLink\ndate\n\n` (verb, type and date lowercased),
//! sent as the url-encoded `type=master&ver=1.0&sig=...` authorization header.

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD},
    chrono::Utc,
    hmac::{Hmac, Mac},
    reqwest::{Method, StatusCode},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    serde_json::json,
    sha2::Sha256,
    tracing::{debug, info},
};

use crate::{
    archive::HistoryArchive,
    message::{ArchivedMessage, Module},
};

const API_VERSION: &str = "2018-12-31";
const THROUGHPUT: &str = "400";

pub struct CosmosArchive {
    client: reqwest::Client,
    endpoint: String,
    key: Secret<String>,
    database: String,
    container: String,
}

impl std::fmt::Debug for CosmosArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmosArchive")
            .field("endpoint", &self.endpoint)
            .field("key", &"[REDACTED]")
            .field("database", &self.database)
            .field("container", &self.container)
            .finish()
    }
}

#[derive(Deserialize)]
struct QueryResponse<T> {
    #[serde(rename = "Documents")]
    documents: Vec<T>,
}

/// Build the master-key authorization header value.
pub fn auth_header(
    key_b64: &str,
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> anyhow::Result<String> {
    let key = STANDARD
        .decode(key_b64)
        .map_err(|e| anyhow::anyhow!("invalid cosmos key: {e}"))?;
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );
    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|e| anyhow::anyhow!("invalid cosmos key: {e}"))?;
    mac.update(payload.as_bytes());
    let sig = STANDARD.encode(mac.finalize().into_bytes());
    Ok(urlencoding::encode(&format!("type=master&ver=1.0&sig={sig}")).into_owned())
}

impl CosmosArchive {
    pub fn new(
        endpoint: impl Into<String>,
        key: Secret<String>,
        database: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            key,
            database: database.into(),
            container: container.into(),
        }
    }

    fn db_link(&self) -> String {
        format!("dbs/{}", self.database)
    }

    fn coll_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.container)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        resource_type: &str,
        resource_link: &str,
    ) -> anyhow::Result<reqwest::RequestBuilder> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let auth = auth_header(
            self.key.expose_secret(),
            method.as_str(),
            resource_type,
            resource_link,
            &date,
        )?;
        Ok(self
            .client
            .request(method, format!("{}/{path}", self.endpoint))
            .header("authorization", auth)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION))
    }

    /// Create the database and container (partitioned on `/user_id`) if missing.
    pub async fn ensure_container(&self) -> anyhow::Result<()> {
        let resp = self
            .request(Method::POST, "dbs", "dbs", "")?
            .json(&json!({ "id": self.database }))
            .send()
            .await?;
        accept_created_or_conflict(resp, "database").await?;

        let resp = self
            .request(
                Method::POST,
                &format!("{}/colls", self.db_link()),
                "colls",
                &self.db_link(),
            )?
            .header("x-ms-offer-throughput", THROUGHPUT)
            .json(&json!({
                "id": self.container,
                "partitionKey": { "paths": ["/user_id"], "kind": "Hash" },
            }))
            .send()
            .await?;
        accept_created_or_conflict(resp, "container").await?;

        info!(database = %self.database, container = %self.container, "cosmos container ready");
        Ok(())
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        user_id: &str,
        query: &str,
        parameters: serde_json::Value,
        max_items: Option<usize>,
    ) -> anyhow::Result<Vec<T>> {
        let link = self.coll_link();
        let mut req = self
            .request(Method::POST, &format!("{link}/docs"), "docs", &link)?
            .header("x-ms-documentdb-isquery", "True")
            .header("content-type", "application/query+json")
            .header("x-ms-documentdb-partitionkey", json!([user_id]).to_string());
        if let Some(n) = max_items {
            req = req.header("x-ms-max-item-count", n.to_string());
        }
        let resp = req
            .body(json!({ "query": query, "parameters": parameters }).to_string())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("cosmos query failed ({status}): {body}");
        }
        let parsed: QueryResponse<T> = resp.json().await?;
        Ok(parsed.documents)
    }
}

async fn accept_created_or_conflict(resp: reqwest::Response, what: &str) -> anyhow::Result<()> {
    let status = resp.status();
    if status.is_success() || status == StatusCode::CONFLICT {
        debug!(%status, what, "cosmos resource ensured");
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("failed to create cosmos {what} ({status}): {body}")
}

#[async_trait]
impl HistoryArchive for CosmosArchive {
    async fn insert(&self, doc: &ArchivedMessage) -> anyhow::Result<()> {
        let link = self.coll_link();
        let resp = self
            .request(Method::POST, &format!("{link}/docs"), "docs", &link)?
            .header(
                "x-ms-documentdb-partitionkey",
                json!([doc.user_id]).to_string(),
            )
            .json(doc)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::CONFLICT {
            debug!(id = %doc.id, "archive document already exists");
            return Ok(());
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("cosmos insert failed ({status}): {body}");
        }
        Ok(())
    }

    async fn recent(
        &self,
        user_id: &str,
        module: Module,
        limit: usize,
    ) -> anyhow::Result<Vec<ArchivedMessage>> {
        let mut docs: Vec<ArchivedMessage> = self
            .query(
                user_id,
                "SELECT * FROM c WHERE c.user_id = @user_id AND c.module = @module ORDER BY c.created_at DESC",
                json!([
                    { "name": "@user_id", "value": user_id },
                    { "name": "@module", "value": module.as_str() },
                ]),
                Some(limit),
            )
            .await?;
        docs.truncate(limit);
        Ok(docs)
    }

    async fn count(&self, user_id: &str, module: Module) -> anyhow::Result<u64> {
        let counts: Vec<u64> = self
            .query(
                user_id,
                "SELECT VALUE COUNT(1) FROM c WHERE c.user_id = @user_id AND c.module = @module",
                json!([
                    { "name": "@user_id", "value": user_id },
                    { "name": "@module", "value": module.as_str() },
                ]),
                None,
            )
            .await?;
        Ok(counts.first().copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::message::ChatMessage, mockito::Matcher};

    const KEY: &str = "Y29zbW9zLXRlc3QtbWFzdGVyLWtleQ==";

    fn archive(url: &str) -> CosmosArchive {
        CosmosArchive::new(url, Secret::new(KEY.into()), "db1", "c1")
    }

    #[test]
    fn signs_with_lowercased_verb_and_date() {
        let header = auth_header(
            KEY,
            "POST",
            "docs",
            "dbs/db1/colls/c1",
            "Mon, 01 Jan 2024 00:00:00 GMT",
        )
        .unwrap();
        assert_eq!(
            header,
            "type%3Dmaster%26ver%3D1.0%26sig%3D3WtTPRrOH%2B4qX7dkK1HAjDCiC4f55IxNEa4xvvjXUak%3D"
        );
    }

    #[test]
    fn rejects_non_base64_key() {
        assert!(auth_header("not base64!", "GET", "dbs", "", "x").is_err());
    }

    #[tokio::test]
    async fn insert_treats_conflict_as_success() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/dbs/db1/colls/c1/docs")
            .match_header("x-ms-documentdb-partitionkey", "[\"alice\"]")
            .match_header("x-ms-version", API_VERSION)
            .with_status(409)
            .create_async()
            .await;

        let msg = ChatMessage::new("user", "hi", None, Module::Rag);
        archive(&server.url())
            .insert(&ArchivedMessage::new("alice", msg))
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn insert_surfaces_server_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/dbs/db1/colls/c1/docs")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let msg = ChatMessage::new("user", "hi", None, Module::Rag);
        let err = archive(&server.url())
            .insert(&ArchivedMessage::new("alice", msg))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn recent_and_count_parse_query_documents() {
        let mut server = mockito::Server::new_async().await;
        let doc = ArchivedMessage::new("bob", ChatMessage::new("user", "q", None, Module::Todo));
        server
            .mock("POST", "/dbs/db1/colls/c1/docs")
            .match_header("x-ms-documentdb-isquery", "True")
            .match_body(Matcher::Regex("ORDER BY c.created_at DESC".into()))
            .with_status(200)
            .with_body(json!({ "Documents": [doc], "_count": 1 }).to_string())
            .create_async()
            .await;
        server
            .mock("POST", "/dbs/db1/colls/c1/docs")
            .match_body(Matcher::Regex("COUNT\\(1\\)".into()))
            .with_status(200)
            .with_body(r#"{"Documents":[7],"_count":1}"#)
            .create_async()
            .await;

        let cosmos = archive(&server.url());
        let recent = cosmos.recent("bob", Module::Todo, 20).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].message.content, "q");
        assert_eq!(cosmos.count("bob", Module::Todo).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn ensure_container_accepts_existing_resources() {
        let mut server = mockito::Server::new_async().await;
        let db = server
            .mock("POST", "/dbs")
            .with_status(409)
            .create_async()
            .await;
        let coll = server
            .mock("POST", "/dbs/db1/colls")
            .match_header("x-ms-offer-throughput", "400")
            .match_body(Matcher::PartialJson(json!({
                "partitionKey": { "paths": ["/user_id"] }
            })))
            .with_status(201)
            .create_async()
            .await;

        archive(&server.url()).ensure_container().await.unwrap();
        db.assert_async().await;
        coll.assert_async().await;
    }
}
