use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::AssistantConfig};

/// Config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "assistant.toml",
    "assistant.yaml",
    "assistant.yml",
    "assistant.json",
];

const APP_DIR: &str = "internal-assistant";

/// Load config from `path`, expand placeholders and apply environment overrides.
pub fn load_config(path: &Path) -> anyhow::Result<AssistantConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut cfg = parse_config(&raw, path)?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./assistant.{toml,yaml,yml,json}`
/// 2. `~/.config/internal-assistant/assistant.{toml,yaml,yml,json}`
///
/// Falls back to defaults plus environment overrides when nothing is found or
/// the file cannot be parsed. The service is usually configured through `.env`
/// alone, so a missing file is not an error.
pub fn discover_and_load() -> AssistantConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using environment only");
    }
    let mut cfg = AssistantConfig::default();
    apply_env_overrides(&mut cfg);
    cfg
}

fn find_config_file() -> Option<PathBuf> {
    first_existing(Path::new(".")).or_else(|| user_config_dir().and_then(|d| first_existing(&d)))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

fn user_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join(APP_DIR))
}

/// Config directory: `~/.config/internal-assistant/`.
pub fn config_dir() -> Option<PathBuf> {
    user_config_dir()
}

/// Data directory for persisted OAuth tokens: `~/.internal-assistant/`.
pub fn data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(format!(".{APP_DIR}")))
        .unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR}")))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<AssistantConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

/// Apply the service's environment variables on top of `cfg`.
pub fn apply_env_overrides(cfg: &mut AssistantConfig) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

/// Same as [`apply_env_overrides`] with an injectable lookup. Empty values are ignored.
pub(crate) fn apply_overrides_from(
    cfg: &mut AssistantConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
    let secret = |key: &str| get(key).map(Secret::new);
    let flag = |key: &str| get(key).map(|v| v.eq_ignore_ascii_case("true"));

    macro_rules! set {
        ($field:expr, $val:expr) => {
            if let Some(v) = $val {
                $field = v;
            }
        };
    }
    macro_rules! set_opt {
        ($field:expr, $val:expr) => {
            if let Some(v) = $val {
                $field = Some(v);
            }
        };
    }

    set!(cfg.server.debug, flag("APP_DEBUG"));

    set!(cfg.azure_openai.endpoint, get("AZURE_OPENAI_ENDPOINT"));
    set_opt!(cfg.azure_openai.api_key, secret("AZURE_OPENAI_API_KEY"));
    set!(cfg.azure_openai.api_version, get("AZURE_OPENAI_API_VERSION"));
    set!(cfg.azure_openai.deployment, get("AZURE_OPENAI_DEPLOYMENT"));
    set!(
        cfg.azure_openai.embed_deployment,
        get("AZURE_OPENAI_EMBED_DEPLOYMENT")
    );

    set!(cfg.qdrant.url, get("QDRANT_URL"));
    set_opt!(cfg.qdrant.api_key, secret("QDRANT_API_KEY"));
    set!(cfg.qdrant.collection, get("QDRANT_COLLECTION"));

    set_opt!(
        cfg.blob.connection_string,
        secret("AZURE_BLOB_CONNECTION_STRING")
    );
    set!(cfg.blob.container, get("AZURE_BLOB_CONTAINER"));

    set!(cfg.docint.endpoint, get("AZURE_DOCINT_ENDPOINT"));
    set_opt!(cfg.docint.key, secret("AZURE_DOCINT_KEY"));

    set!(cfg.identity.client_id, get("MS_CLIENT_ID"));
    set_opt!(cfg.identity.client_secret, secret("MS_CLIENT_SECRET"));
    set!(cfg.identity.tenant_id, get("MS_TENANT_ID"));
    set!(cfg.identity.graph_scope, get("MS_GRAPH_SCOPE"));
    set_opt!(cfg.identity.group_id, get("MS_GROUP_ID"));
    set!(cfg.identity.todo_redirect_uri, get("AZURE_REDIRECT_URI"));

    set!(cfg.redis.host, get("REDIS_HOST"));
    set!(cfg.redis.port, get("REDIS_PORT").and_then(|p| p.parse().ok()));
    set_opt!(cfg.redis.password, secret("REDIS_PASSWORD"));
    set!(cfg.redis.ssl, flag("REDIS_SSL"));

    set!(cfg.cosmos.endpoint, get("COSMOS_ENDPOINT"));
    set_opt!(cfg.cosmos.key, secret("COSMOS_KEY"));
    set!(cfg.cosmos.database, get("COSMOS_DATABASE"));
    set!(cfg.cosmos.container, get("COSMOS_CONTAINER"));

    set_opt!(cfg.notify.webhook_url, get("NOTIFY_WEBHOOK_URL"));
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, std::collections::HashMap};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut cfg = AssistantConfig::default();
        apply_overrides_from(
            &mut cfg,
            lookup(&[
                ("AZURE_OPENAI_ENDPOINT", "https://aoai.example"),
                ("AZURE_OPENAI_API_KEY", "k1"),
                ("REDIS_PORT", "6379"),
                ("REDIS_SSL", "false"),
                ("MS_GROUP_ID", "g-1"),
                ("APP_DEBUG", "TRUE"),
            ]),
        );
        assert_eq!(cfg.azure_openai.endpoint, "https://aoai.example");
        assert_eq!(
            cfg.azure_openai
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().as_str()),
            Some("k1")
        );
        assert_eq!(cfg.redis.port, 6379);
        assert!(!cfg.redis.ssl);
        assert_eq!(cfg.identity.group_id.as_deref(), Some("g-1"));
        assert!(cfg.server.debug);
    }

    #[test]
    fn empty_and_invalid_values_are_ignored() {
        let mut cfg = AssistantConfig::default();
        apply_overrides_from(
            &mut cfg,
            lookup(&[("QDRANT_COLLECTION", ""), ("REDIS_PORT", "not-a-port")]),
        );
        assert_eq!(cfg.qdrant.collection, "internal-docs-index");
        assert_eq!(cfg.redis.port, 6380);
    }

    #[test]
    fn parses_toml_and_yaml() {
        let toml_cfg = parse_config(
            "[server]\nport = 9000\n[rag]\nmax_docs = 4\n",
            Path::new("assistant.toml"),
        )
        .unwrap();
        assert_eq!(toml_cfg.server.port, 9000);
        assert_eq!(toml_cfg.rag.max_docs, 4);
        assert_eq!(toml_cfg.rag.default_prefix, "sop/");

        let yaml_cfg = parse_config(
            "memory:\n  max_history: 3\n",
            Path::new("assistant.yaml"),
        )
        .unwrap();
        assert_eq!(yaml_cfg.memory.max_history, 3);

        assert!(parse_config("", Path::new("assistant.ini")).is_err());
    }

    #[test]
    fn load_from_file_substitutes_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assistant.toml");
        std::fs::write(
            &path,
            "[blob]\ncontainer = \"${ASSISTANT_LOADER_TEST_CONTAINER:-templates}\"\n",
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.blob.container, "templates");
    }
}
