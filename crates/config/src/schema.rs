/// Config schema types (server, Azure services, identity, memory, RAG).
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize, Serializer};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub server: ServerConfig,
    pub azure_openai: AzureOpenAiConfig,
    pub qdrant: QdrantConfig,
    pub blob: BlobConfig,
    pub docint: DocIntelConfig,
    pub identity: IdentityConfig,
    pub redis: RedisConfig,
    pub cosmos: CosmosConfig,
    pub memory: MemoryConfig,
    pub notify: NotifyConfig,
    pub rag: RagConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Origins allowed by the CORS layer. Credentials are always allowed.
    pub cors_origins: Vec<String>,
    /// Enables verbose error details in HTTP responses.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8001,
            cors_origins: vec![
                "http://localhost:8001".into(),
                "http://127.0.0.1:8001".into(),
            ],
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    #[serde(serialize_with = "serialize_option_secret")]
    pub api_key: Option<Secret<String>>,
    pub api_version: String,
    /// Chat completion deployment name.
    pub deployment: String,
    /// Embedding deployment name.
    pub embed_deployment: String,
    pub temperature: f32,
    pub embed_batch_size: usize,
    pub embed_dimensions: usize,
}

impl Default for AzureOpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            api_version: "2024-05-01-preview".into(),
            deployment: "gpt-4o-mini".into(),
            embed_deployment: "text-embedding-3-large".into(),
            temperature: 0.2,
            embed_batch_size: 32,
            embed_dimensions: 3072,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    #[serde(serialize_with = "serialize_option_secret")]
    pub api_key: Option<Secret<String>>,
    pub collection: String,
    pub vector_size: usize,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            collection: "internal-docs-index".into(),
            vector_size: 3072,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Azure storage connection string (`DefaultEndpointsProtocol=...;AccountName=...`).
    #[serde(serialize_with = "serialize_option_secret")]
    pub connection_string: Option<Secret<String>>,
    pub container: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            container: "internal-docs".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocIntelConfig {
    pub endpoint: String,
    #[serde(serialize_with = "serialize_option_secret")]
    pub key: Option<Secret<String>>,
    pub api_version: String,
}

impl Default for DocIntelConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            key: None,
            api_version: "2023-07-31".into(),
        }
    }
}

/// Microsoft Entra app registration used for Planner and To-Do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub client_id: String,
    #[serde(serialize_with = "serialize_option_secret")]
    pub client_secret: Option<Secret<String>>,
    pub tenant_id: String,
    pub graph_scope: String,
    /// Optional default Planner group.
    pub group_id: Option<String>,
    pub project_redirect_uri: String,
    pub todo_redirect_uri: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            tenant_id: String::new(),
            graph_scope: "https://graph.microsoft.com/.default".into(),
            group_id: None,
            project_redirect_uri: "http://localhost:8001/project/auth/callback".into(),
            todo_redirect_uri: "http://localhost:8001/auth/callback".into(),
        }
    }
}

impl IdentityConfig {
    /// `https://login.microsoftonline.com/{tenant}`
    pub fn authority(&self) -> String {
        format!("https://login.microsoftonline.com/{}", self.tenant_id)
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.tenant_id.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    #[serde(serialize_with = "serialize_option_secret")]
    pub password: Option<Secret<String>>,
    pub ssl: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 6380,
            password: None,
            ssl: true,
        }
    }
}

impl RedisConfig {
    /// Connection URL in the form understood by the `redis` crate.
    pub fn url(&self) -> String {
        let scheme = if self.ssl {
            "rediss"
        } else {
            "redis"
        };
        match &self.password {
            Some(pw) => format!(
                "{scheme}://:{}@{}:{}",
                pw.expose_secret(),
                self.host,
                self.port
            ),
            None => format!("{scheme}://{}:{}", self.host, self.port),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmosConfig {
    pub endpoint: String,
    #[serde(serialize_with = "serialize_option_secret")]
    pub key: Option<Secret<String>>,
    pub database: String,
    pub container: String,
}

impl Default for CosmosConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            key: None,
            database: "internal_assistant".into(),
            container: "conversation_history".into(),
        }
    }
}

/// Conversation memory tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// TTL of the short-term cache entry, refreshed on every write.
    pub session_ttl_secs: u64,
    /// Number of exchanges kept in the short-term cache (two messages each).
    pub max_history: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 3600,
            max_history: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub default_prefix: String,
    pub max_docs: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            default_prefix: "sop/".into(),
            max_docs: 10,
        }
    }
}

impl AssistantConfig {
    /// JSON view of the configuration with every secret replaced by `"[REDACTED]"`.
    pub fn redacted(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        redact(&mut value);
        value
    }
}

const SECRET_FIELDS: &[&str] = &["api_key", "key", "password", "client_secret", "connection_string"];

fn redact(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        for (k, v) in map.iter_mut() {
            if SECRET_FIELDS.contains(&k.as_str()) && !v.is_null() {
                *v = serde_json::Value::String("[REDACTED]".into());
            } else {
                redact(v);
            }
        }
    }
}

/// Serializes an optional secret in clear text so the config can be saved back.
pub fn serialize_option_secret<S: Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_settings() {
        let cfg = AssistantConfig::default();
        assert_eq!(cfg.server.port, 8001);
        assert_eq!(cfg.azure_openai.deployment, "gpt-4o-mini");
        assert_eq!(cfg.azure_openai.embed_deployment, "text-embedding-3-large");
        assert_eq!(cfg.qdrant.collection, "internal-docs-index");
        assert_eq!(cfg.redis.port, 6380);
        assert!(cfg.redis.ssl);
        assert_eq!(cfg.memory.session_ttl_secs, 3600);
        assert_eq!(cfg.memory.max_history, 10);
        assert_eq!(cfg.rag.default_prefix, "sop/");
    }

    #[test]
    fn redis_url_uses_tls_scheme_and_password() {
        let cfg = RedisConfig {
            host: "cache.example.net".into(),
            port: 6380,
            password: Some(Secret::new("pw".into())),
            ssl: true,
        };
        assert_eq!(cfg.url(), "rediss://:pw@cache.example.net:6380");

        let plain = RedisConfig {
            host: "localhost".into(),
            port: 6379,
            password: None,
            ssl: false,
        };
        assert_eq!(plain.url(), "redis://localhost:6379");
    }

    #[test]
    fn redacted_view_hides_secrets() {
        let mut cfg = AssistantConfig::default();
        cfg.azure_openai.api_key = Some(Secret::new("sk-live".into()));
        cfg.cosmos.key = Some(Secret::new("cosmos-key".into()));
        let view = cfg.redacted();
        assert_eq!(view["azure_openai"]["api_key"], "[REDACTED]");
        assert_eq!(view["cosmos"]["key"], "[REDACTED]");
        assert!(view["qdrant"]["api_key"].is_null());
        assert!(!view.to_string().contains("sk-live"));
    }

    #[test]
    fn authority_includes_tenant() {
        let identity = IdentityConfig {
            tenant_id: "contoso".into(),
            ..Default::default()
        };
        assert_eq!(
            identity.authority(),
            "https://login.microsoftonline.com/contoso"
        );
    }
}
