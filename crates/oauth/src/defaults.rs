use std::collections::HashMap;

use assistant_config::IdentityConfig;

use crate::types::OAuthConfig;

/// Planner access: public client with PKCE.
pub const PLANNER: &str = "planner";
/// To-Do access: confidential client with refresh tokens.
pub const TODO: &str = "todo";

const PLANNER_SCOPES: &[&str] = &[
    "https://graph.microsoft.com/User.Read",
    "https://graph.microsoft.com/Tasks.Read",
    "https://graph.microsoft.com/Group.Read.All",
];

const TODO_SCOPES: &[&str] = &["Tasks.Read", "Tasks.ReadWrite"];

fn builtin_defaults(identity: &IdentityConfig) -> HashMap<String, OAuthConfig> {
    let authority = identity.authority();
    let auth_url = format!("{authority}/oauth2/v2.0/authorize");
    let token_url = format!("{authority}/oauth2/v2.0/token");

    let mut m = HashMap::new();
    m.insert(PLANNER.into(), OAuthConfig {
        client_id: identity.client_id.clone(),
        client_secret: None,
        auth_url: auth_url.clone(),
        token_url: token_url.clone(),
        redirect_uri: identity.project_redirect_uri.clone(),
        scopes: PLANNER_SCOPES.iter().map(|s| s.to_string()).collect(),
        use_pkce: true,
        extra_auth_params: vec![("response_mode".into(), "query".into())],
    });
    m.insert(TODO.into(), OAuthConfig {
        client_id: identity.client_id.clone(),
        client_secret: identity.client_secret.clone(),
        auth_url,
        token_url,
        redirect_uri: identity.todo_redirect_uri.clone(),
        scopes: TODO_SCOPES.iter().map(|s| s.to_string()).collect(),
        use_pkce: false,
        extra_auth_params: vec![("response_mode".into(), "query".into())],
    });
    m
}

/// Load the OAuth config for a provider.
///
/// Priority (later wins):
/// 1. Built-in defaults derived from the identity settings
/// 2. `oauth_providers.json` in the config directory
/// 3. `ASSISTANT_OAUTH_{PROVIDER}_{CLIENT_ID|AUTH_URL|TOKEN_URL|REDIRECT_URI}`
pub fn load_oauth_config(provider: &str, identity: &IdentityConfig) -> Option<OAuthConfig> {
    let mut config = builtin_defaults(identity).remove(provider)?;

    if let Some(path) = assistant_config::config_dir().map(|d| d.join("oauth_providers.json"))
        && let Ok(data) = std::fs::read_to_string(path)
        && let Ok(mut file_configs) = serde_json::from_str::<HashMap<String, OAuthConfig>>(&data)
        && let Some(file_config) = file_configs.remove(provider)
    {
        config = file_config;
    }

    apply_env(&mut config, provider, |k| std::env::var(k).ok());
    Some(config)
}

fn apply_env(config: &mut OAuthConfig, provider: &str, lookup: impl Fn(&str) -> Option<String>) {
    let prefix = format!(
        "ASSISTANT_OAUTH_{}_",
        provider.to_uppercase().replace('-', "_")
    );
    let var = |suffix: &str| lookup(&format!("{prefix}{suffix}"));
    if let Some(v) = var("CLIENT_ID") {
        config.client_id = v;
    }
    if let Some(v) = var("AUTH_URL") {
        config.auth_url = v;
    }
    if let Some(v) = var("TOKEN_URL") {
        config.token_url = v;
    }
    if let Some(v) = var("REDIRECT_URI") {
        config.redirect_uri = v;
    }
}
