//! Azure Blob Storage over REST with SharedKey auth and service SAS URLs.

use {
    assistant_common::AssistantError,
    assistant_config::BlobConfig,
    async_trait::async_trait,
    base64::{Engine as _, engine::general_purpose::STANDARD},
    chrono::{DateTime, Duration, Utc},
    hmac::{Hmac, Mac},
    reqwest::{Method, StatusCode},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    sha2::Sha256,
    tracing::{debug, warn},
};

use crate::blob::{BlobItem, BlobStore};

const API_VERSION: &str = "2021-08-06";

/// Parsed `DefaultEndpointsProtocol=...;AccountName=...;AccountKey=...` string.
#[derive(Debug, Clone)]
pub struct StorageAccount {
    pub name: String,
    key: Option<Secret<String>>,
    pub blob_endpoint: String,
}

impl StorageAccount {
    pub fn parse(connection_string: &str) -> Result<Self, AssistantError> {
        let mut name = None;
        let mut key = None;
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();
        let mut endpoint = None;

        for pair in connection_string.split(';').filter(|p| !p.trim().is_empty()) {
            let Some((k, v)) = pair.split_once('=') else {
                continue;
            };
            match k.trim() {
                "AccountName" => name = Some(v.to_string()),
                "AccountKey" => key = Some(Secret::new(v.to_string())),
                "DefaultEndpointsProtocol" => protocol = v.to_string(),
                "EndpointSuffix" => suffix = v.to_string(),
                "BlobEndpoint" => endpoint = Some(v.trim_end_matches('/').to_string()),
                _ => {},
            }
        }

        let name = name.ok_or_else(|| {
            AssistantError::InvalidInput("storage connection string has no AccountName".into())
        })?;
        let blob_endpoint = endpoint.unwrap_or_else(|| format!("{protocol}://{name}.blob.{suffix}"));
        Ok(Self {
            name,
            key,
            blob_endpoint,
        })
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    fn sign(&self, string_to_sign: &str) -> Result<String, AssistantError> {
        let key = self.key.as_ref().ok_or(AssistantError::NotConfigured("storage account key"))?;
        let raw = STANDARD
            .decode(key.expose_secret())
            .map_err(|e| AssistantError::InvalidInput(format!("storage account key is not base64: {e}")))?;
        let mut mac = Hmac::<Sha256>::new_from_slice(&raw)
            .map_err(|e| AssistantError::InvalidInput(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// URL-encode each segment of a blob name, keeping the slashes.
fn encode_path(name: &str) -> String {
    name.split('/')
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

struct CanonicalRequest<'a> {
    method: &'a Method,
    /// Encoded path starting with `/{container}`.
    path: &'a str,
    query: &'a [(&'a str, String)],
    content_length: usize,
    content_type: &'a str,
    ms_headers: &'a [(&'a str, String)],
}

impl CanonicalRequest<'_> {
    fn string_to_sign(&self, account: &str) -> String {
        let length = if self.content_length == 0 {
            String::new()
        } else {
            self.content_length.to_string()
        };

        let mut headers: Vec<(String, &str)> = self
            .ms_headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();
        headers.sort();

        let mut query: Vec<(String, &str)> = self
            .query
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();
        query.sort();

        let mut out = [
            self.method.as_str(),
            "",
            "",
            length.as_str(),
            "",
            self.content_type,
            "",
            "",
            "",
            "",
            "",
            "",
        ]
        .join("\n");
        out.push('\n');
        for (k, v) in headers {
            out.push_str(&format!("{k}:{v}\n"));
        }
        out.push_str(&format!("/{account}{}", self.path));
        for (k, v) in query {
            out.push_str(&format!("\n{k}:{v}"));
        }
        out
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: BlobList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlobList {
    #[serde(rename = "Blob", default)]
    items: Vec<BlobEntry>,
}

#[derive(Debug, Deserialize)]
struct BlobEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Properties", default)]
    properties: BlobProperties,
}

#[derive(Debug, Default, Deserialize)]
struct BlobProperties {
    #[serde(rename = "Creation-Time", default)]
    creation_time: Option<String>,
    #[serde(rename = "Last-Modified", default)]
    last_modified: Option<String>,
    #[serde(rename = "Content-Length", default)]
    content_length: Option<u64>,
    #[serde(rename = "Content-Type", default)]
    content_type: Option<String>,
}

fn parse_http_date(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn parse_listing(xml: &str) -> anyhow::Result<(Vec<BlobItem>, Option<String>)> {
    let page: EnumerationResults = quick_xml::de::from_str(xml)?;
    let items = page
        .blobs
        .items
        .into_iter()
        .map(|b| BlobItem {
            name: b.name,
            size: b.properties.content_length.unwrap_or_default(),
            content_type: b.properties.content_type.filter(|c| !c.is_empty()),
            last_modified: parse_http_date(b.properties.last_modified.as_deref()),
            creation_time: parse_http_date(b.properties.creation_time.as_deref()),
        })
        .collect();
    Ok((items, page.next_marker.filter(|m| !m.is_empty())))
}

pub struct AzureBlobStore {
    client: reqwest::Client,
    account: StorageAccount,
    container: String,
}

impl AzureBlobStore {
    pub fn new(account: StorageAccount, container: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            account,
            container: container.into(),
        }
    }

    pub fn from_config(config: &BlobConfig) -> Result<Self, AssistantError> {
        let conn = config
            .connection_string
            .as_ref()
            .ok_or(AssistantError::NotConfigured("Azure Blob Storage"))?;
        Ok(Self::new(
            StorageAccount::parse(conn.expose_secret())?,
            config.container.clone(),
        ))
    }

    pub fn account(&self) -> &StorageAccount {
        &self.account
    }

    async fn send(
        &self,
        method: Method,
        blob: Option<&str>,
        query: &[(&str, String)],
        body: Option<(Vec<u8>, &str)>,
    ) -> anyhow::Result<reqwest::Response> {
        let path = match blob {
            Some(name) => format!("/{}/{}", self.container, encode_path(name)),
            None => format!("/{}", self.container),
        };
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let mut ms_headers = vec![("x-ms-date", date), ("x-ms-version", API_VERSION.to_string())];
        if body.is_some() {
            ms_headers.push(("x-ms-blob-type", "BlockBlob".to_string()));
        }
        let (content_length, content_type) = body.as_ref().map_or((0, ""), |(d, t)| (d.len(), *t));

        let canonical = CanonicalRequest {
            method: &method,
            path: &path,
            query,
            content_length,
            content_type,
            ms_headers: &ms_headers,
        };
        let signature = self.account.sign(&canonical.string_to_sign(&self.account.name))?;

        let mut url = format!("{}{path}", self.account.blob_endpoint);
        if !query.is_empty() {
            let qs = query
                .iter()
                .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url = format!("{url}?{qs}");
        }

        let mut req = self
            .client
            .request(method, url)
            .header("Authorization", format!("SharedKey {}:{signature}", self.account.name));
        for (k, v) in &ms_headers {
            req = req.header(*k, v);
        }
        if let Some((data, content_type)) = body {
            req = req.header("Content-Type", content_type).body(data);
        }
        Ok(req.send().await?)
    }

    async fn check(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AssistantError::upstream(status.as_u16(), body).into())
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobItem>> {
        let mut all = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut query = vec![("comp", "list".to_string()), ("restype", "container".to_string())];
            if !prefix.is_empty() {
                query.push(("prefix", prefix.to_string()));
            }
            if let Some(m) = &marker {
                query.push(("marker", m.clone()));
            }
            let resp = Self::check(self.send(Method::GET, None, &query, None).await?).await?;
            let (items, next) = parse_listing(&resp.text().await?)?;
            debug!(count = items.len(), prefix, "listed blobs");
            all.extend(items);
            match next {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        Ok(all)
    }

    async fn download(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        let resp = Self::check(self.send(Method::GET, Some(name), &[], None).await?).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn upload(&self, name: &str, data: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        Self::check(
            self.send(Method::PUT, Some(name), &[], Some((data, content_type)))
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> anyhow::Result<bool> {
        let resp = self.send(Method::HEAD, Some(name), &[], None).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => Self::check(resp).await.map(|_| true),
        }
    }

    async fn delete(&self, name: &str) -> anyhow::Result<bool> {
        let resp = self.send(Method::DELETE, Some(name), &[], None).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            warn!(blob = name, "blob does not exist");
            return Ok(false);
        }
        Self::check(resp).await?;
        Ok(true)
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.account.blob_endpoint, self.container, encode_path(name))
    }

    fn read_sas_url(&self, name: &str, expiry_minutes: i64) -> Result<String, AssistantError> {
        let expiry = Utc::now() + Duration::minutes(expiry_minutes);
        let sas = service_sas(&self.account, &self.container, name, expiry)?;
        Ok(format!("{}?{sas}", self.url(name)))
    }
}

/// Read-only service SAS query string for one blob.
pub fn service_sas(
    account: &StorageAccount,
    container: &str,
    blob: &str,
    expiry: DateTime<Utc>,
) -> Result<String, AssistantError> {
    let se = expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let resource = format!("/blob/{}/{container}/{blob}", account.name);
    // permissions, start, expiry, resource, identifier, ip, protocol, version,
    // resource type, snapshot, encryption scope, then five response headers
    let string_to_sign = [
        "r", "", se.as_str(), resource.as_str(), "", "", "", API_VERSION, "b", "", "", "", "", "", "", "",
    ]
    .join("\n");
    let sig = account.sign(&string_to_sign)?;
    Ok(format!(
        "se={}&sp=r&sv={API_VERSION}&sr=b&sig={}",
        urlencoding::encode(&se),
        urlencoding::encode(&sig)
    ))
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone};

    const KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

    fn account() -> StorageAccount {
        StorageAccount::parse(&format!(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey={KEY};EndpointSuffix=core.windows.net"
        ))
        .unwrap()
    }

    #[test]
    fn parses_connection_strings() {
        let a = account();
        assert_eq!(a.name, "acct");
        assert_eq!(a.blob_endpoint, "https://acct.blob.core.windows.net");
        assert!(a.has_key());

        let local = StorageAccount::parse("AccountName=dev;BlobEndpoint=http://127.0.0.1:10000/dev/").unwrap();
        assert_eq!(local.blob_endpoint, "http://127.0.0.1:10000/dev");
        assert!(!local.has_key());
        assert!(matches!(
            service_sas(&local, "c", "b", Utc::now()),
            Err(AssistantError::NotConfigured(_))
        ));

        assert!(StorageAccount::parse("AccountKey=abc").is_err());
    }

    #[test]
    fn shared_key_for_listing() {
        let date = "Mon, 01 Jan 2024 00:00:00 GMT".to_string();
        let query = [
            ("restype", "container".to_string()),
            ("comp", "list".to_string()),
            ("prefix", "sop/".to_string()),
        ];
        let headers = [("x-ms-version", API_VERSION.to_string()), ("x-ms-date", date)];
        let req = CanonicalRequest {
            method: &Method::GET,
            path: "/docs",
            query: &query,
            content_length: 0,
            content_type: "",
            ms_headers: &headers,
        };
        let sts = req.string_to_sign("acct");
        assert_eq!(
            sts,
            "GET\n\n\n\n\n\n\n\n\n\n\n\nx-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\nx-ms-version:2021-08-06\n/acct/docs\ncomp:list\nprefix:sop/\nrestype:container"
        );
        assert_eq!(account().sign(&sts).unwrap(), "w7ZXMqR8IR1ERqeLIfjJHPowSK3iKmJwJm2iS+zoeWA=");
    }

    #[test]
    fn shared_key_for_upload() {
        let headers = [
            ("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT".to_string()),
            ("x-ms-version", API_VERSION.to_string()),
            ("x-ms-blob-type", "BlockBlob".to_string()),
        ];
        let path = format!("/docs/{}", encode_path("sop/My File.pdf"));
        let req = CanonicalRequest {
            method: &Method::PUT,
            path: &path,
            query: &[],
            content_length: 6,
            content_type: "application/pdf",
            ms_headers: &headers,
        };
        assert_eq!(
            account().sign(&req.string_to_sign("acct")).unwrap(),
            "9Zr8IRysOVHOvRcIr6Zvqh38Ee/MzwJmTk563AVi/p4="
        );
    }

    #[test]
    fn read_only_service_sas() {
        let expiry = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let sas = service_sas(&account(), "docs", "templates/contract.docx", expiry).unwrap();
        assert_eq!(
            sas,
            "se=2024-01-01T01%3A00%3A00Z&sp=r&sv=2021-08-06&sr=b&sig=rewRD5Y4QVSqNhSkAB1WscCZsSWzod5Fb16AO6Ef%2BJ4%3D"
        );
    }

    #[test]
    fn parses_list_blobs_xml() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/" ContainerName="docs">
  <Prefix>sop/</Prefix>
  <Blobs>
    <Blob>
      <Name>sop/a.pdf</Name>
      <Properties>
        <Creation-Time>Mon, 01 Jan 2024 08:00:00 GMT</Creation-Time>
        <Last-Modified>Tue, 02 Jan 2024 09:30:00 GMT</Last-Modified>
        <Etag>0x8DC</Etag>
        <Content-Length>1024</Content-Length>
        <Content-Type>application/pdf</Content-Type>
        <BlobType>BlockBlob</BlobType>
      </Properties>
    </Blob>
    <Blob>
      <Name>sop/b.docx</Name>
      <Properties>
        <Content-Length>10</Content-Length>
        <Content-Type />
      </Properties>
    </Blob>
  </Blobs>
  <NextMarker>2!abc</NextMarker>
</EnumerationResults>"#;
        let (items, next) = parse_listing(xml).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "sop/a.pdf");
        assert_eq!(items[0].size, 1024);
        assert_eq!(
            items[0].last_modified.unwrap().to_rfc3339(),
            "2024-01-02T09:30:00+00:00"
        );
        assert_eq!(items[1].content_type, None);
        assert_eq!(next.as_deref(), Some("2!abc"));
    }

    #[tokio::test]
    async fn list_follows_markers_and_signs_requests() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", mockito::Matcher::Regex("^/docs\\?comp=list&restype=container&prefix=sop%2F$".into()))
            .match_header("x-ms-version", API_VERSION)
            .match_header("Authorization", mockito::Matcher::Regex("^SharedKey acct:".into()))
            .with_body("<EnumerationResults><Blobs><Blob><Name>sop/a.pdf</Name></Blob></Blobs><NextMarker>m1</NextMarker></EnumerationResults>")
            .create_async()
            .await;
        let second = server
            .mock("GET", mockito::Matcher::Regex("marker=m1".into()))
            .with_body("<EnumerationResults><Blobs><Blob><Name>sop/b.pdf</Name></Blob></Blobs><NextMarker/></EnumerationResults>")
            .create_async()
            .await;
        let missing = server
            .mock("DELETE", "/docs/sop/gone.pdf")
            .with_status(404)
            .create_async()
            .await;

        let acct = StorageAccount::parse(&format!("AccountName=acct;AccountKey={KEY};BlobEndpoint={}", server.url())).unwrap();
        let store = AzureBlobStore::new(acct, "docs");
        let names: Vec<_> = store.list("sop/").await.unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, ["sop/a.pdf", "sop/b.pdf"]);
        assert!(!store.delete("sop/gone.pdf").await.unwrap());
        first.assert_async().await;
        second.assert_async().await;
        missing.assert_async().await;
        assert_eq!(store.url("sop/a b.pdf"), format!("{}/docs/sop/a%20b.pdf", server.url()));
    }
}
