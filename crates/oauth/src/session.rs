//! Per-user delegated sessions: pending logins, stored tokens, refresh.

use {
    assistant_common::AssistantError,
    dashmap::DashMap,
    secrecy::Secret,
    tracing::{info, warn},
};

use crate::{
    flow::{OAuthFlow, unix_now},
    pkce::{generate_pkce, generate_state},
    storage::TokenStore,
    types::{OAuthConfig, OAuthTokens},
};

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_BUFFER_SECS: u64 = 5 * 60;

struct PendingLogin {
    user_id: String,
    verifier: Option<String>,
}

/// Login state for one provider across all users.
pub struct DelegatedSession {
    provider: String,
    flow: OAuthFlow,
    tokens: DashMap<String, OAuthTokens>,
    /// Keyed by the `state` sent to the authorize endpoint.
    pending: DashMap<String, PendingLogin>,
    store: Option<TokenStore>,
}

impl DelegatedSession {
    pub fn new(provider: impl Into<String>, config: OAuthConfig) -> Self {
        Self {
            provider: provider.into(),
            flow: OAuthFlow::new(config),
            tokens: DashMap::new(),
            pending: DashMap::new(),
            store: None,
        }
    }

    /// Persist tokens in `store` and restore any saved for this provider.
    pub fn with_store(mut self, store: TokenStore) -> Self {
        for (user, tokens) in store.load_provider(&self.provider) {
            self.tokens.insert(user, tokens);
        }
        self.store = Some(store);
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn uses_pkce(&self) -> bool {
        self.flow.config().use_pkce
    }

    /// Start a login for `user_id` and return the authorize URL.
    pub fn begin_login(&self, user_id: &str) -> anyhow::Result<String> {
        let state = generate_state();
        let pkce = self.uses_pkce().then(generate_pkce);
        let url = self.flow.authorization_url(&state, pkce.as_ref())?;
        self.pending.retain(|_, p| p.user_id != user_id);
        self.pending.insert(state, PendingLogin {
            user_id: user_id.to_string(),
            verifier: pkce.map(|p| p.verifier),
        });
        Ok(url)
    }

    /// Finish a login from the redirect parameters. Returns the user id the
    /// login was started for.
    pub async fn complete_login(&self, code: &str, state: Option<&str>) -> anyhow::Result<String> {
        let Some(state) = state else {
            if self.uses_pkce() {
                anyhow::bail!("PKCE data not found. Please restart the authentication process.");
            }
            anyhow::bail!("Missing state parameter. Please restart the authentication process.");
        };
        let Some((_, pending)) = self.pending.remove(state) else {
            anyhow::bail!("State validation failed. Possible CSRF attack.");
        };
        if self.uses_pkce() && pending.verifier.is_none() {
            anyhow::bail!("PKCE data not found. Please restart the authentication process.");
        }

        let tokens = self.flow.exchange(code, pending.verifier.as_deref()).await?;
        self.store_tokens(&pending.user_id, tokens);
        info!(provider = %self.provider, user_id = %pending.user_id, "login completed");
        Ok(pending.user_id)
    }

    fn store_tokens(&self, user_id: &str, tokens: OAuthTokens) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(&self.provider, user_id, &tokens)
        {
            warn!(provider = %self.provider, error = %e, "failed to persist tokens");
        }
        self.tokens.insert(user_id.to_string(), tokens);
    }

    /// Install tokens obtained elsewhere.
    pub fn set_tokens(&self, user_id: &str, tokens: OAuthTokens) {
        self.store_tokens(user_id, tokens);
    }

    /// A valid access token, refreshed when it is about to expire. A failed
    /// refresh logs the user out.
    pub async fn access_token(&self, user_id: &str) -> Result<Secret<String>, AssistantError> {
        let current = self
            .tokens
            .get(user_id)
            .map(|t| t.value().clone())
            .ok_or(AssistantError::NotAuthenticated)?;

        // Tokens without expiry information are used as-is until Graph rejects them.
        if current.expires_at.is_none() || !current.is_expired(unix_now(), EXPIRY_BUFFER_SECS) {
            return Ok(current.access_token);
        }

        let Some(refresh) = current.refresh_token.clone() else {
            self.logout(user_id);
            return Err(AssistantError::NotAuthenticated);
        };

        match self.flow.refresh(&refresh).await {
            Ok(mut fresh) => {
                if fresh.refresh_token.is_none() {
                    fresh.refresh_token = Some(refresh);
                }
                let token = fresh.access_token.clone();
                self.store_tokens(user_id, fresh);
                info!(provider = %self.provider, user_id, "access token refreshed");
                Ok(token)
            },
            Err(e) => {
                warn!(provider = %self.provider, user_id, error = %e, "token refresh failed");
                self.logout(user_id);
                Err(AssistantError::NotAuthenticated)
            },
        }
    }

    /// True when a usable token exists (refreshing if needed).
    pub async fn is_authenticated(&self, user_id: &str) -> bool {
        self.access_token(user_id).await.is_ok()
    }

    /// Unix expiry of the user's current access token.
    pub fn expires_at(&self, user_id: &str) -> Option<u64> {
        self.tokens.get(user_id).and_then(|t| t.expires_at)
    }

    /// Forget tokens and pending logins of `user_id`.
    pub fn logout(&self, user_id: &str) {
        self.tokens.remove(user_id);
        self.pending.retain(|_, p| p.user_id != user_id);
        if let Some(store) = &self.store
            && let Err(e) = store.delete(&self.provider, user_id)
        {
            warn!(provider = %self.provider, error = %e, "failed to delete stored tokens");
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    fn config(token_url: &str, use_pkce: bool) -> OAuthConfig {
        OAuthConfig {
            client_id: "cid".into(),
            client_secret: None,
            auth_url: "https://login.example/authorize".into(),
            token_url: token_url.into(),
            redirect_uri: "http://localhost/cb".into(),
            scopes: vec!["Tasks.Read".into()],
            use_pkce,
            extra_auth_params: vec![],
        }
    }

    fn state_of(url: &str) -> String {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    fn tokens(expires_at: Option<u64>, refresh: Option<&str>) -> OAuthTokens {
        OAuthTokens {
            access_token: Secret::new("old".into()),
            refresh_token: refresh.map(|r| Secret::new(r.to_string())),
            received_at: 0,
            expires_at,
        }
    }

    #[tokio::test]
    async fn full_login_with_pkce() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::Regex("code_verifier=".into()))
            .with_status(200)
            .with_body(r#"{"access_token":"AT","expires_in":3600}"#)
            .create_async()
            .await;

        let session = DelegatedSession::new("planner", config(&format!("{}/token", server.url()), true));
        let url = session.begin_login("alice").unwrap();
        assert!(url.contains("code_challenge="));

        let user = session.complete_login("code", Some(&state_of(&url))).await.unwrap();
        assert_eq!(user, "alice");
        assert_eq!(session.access_token("alice").await.unwrap().expose_secret(), "AT");
        assert!(session.is_authenticated("alice").await);
        assert!(!session.is_authenticated("bob").await);
    }

    #[tokio::test]
    async fn unknown_state_is_rejected() {
        let session = DelegatedSession::new("planner", config("http://127.0.0.1:9/token", true));
        session.begin_login("alice").unwrap();
        let err = session.complete_login("code", Some("forged")).await.unwrap_err();
        assert_eq!(err.to_string(), "State validation failed. Possible CSRF attack.");

        let err = session.complete_login("code", None).await.unwrap_err();
        assert!(err.to_string().starts_with("PKCE data not found"));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"fresh","expires_in":3600}"#)
            .create_async()
            .await;

        let session = DelegatedSession::new("todo", config(&format!("{}/token", server.url()), false));
        session.set_tokens("u", tokens(Some(1), Some("rt")));
        assert_eq!(session.access_token("u").await.unwrap().expose_secret(), "fresh");
        assert!(session.expires_at("u").unwrap() > 1);
    }

    #[tokio::test]
    async fn failed_refresh_logs_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let session = DelegatedSession::new("todo", config(&format!("{}/token", server.url()), false));
        session.set_tokens("u", tokens(Some(1), Some("rt")));
        assert!(matches!(
            session.access_token("u").await,
            Err(AssistantError::NotAuthenticated)
        ));
        assert!(session.expires_at("u").is_none());
    }

    #[tokio::test]
    async fn expired_without_refresh_token_logs_out() {
        let session = DelegatedSession::new("todo", config("http://127.0.0.1:9/token", false));
        session.set_tokens("u", tokens(Some(1), None));
        assert!(!session.is_authenticated("u").await);
        session.set_tokens("v", tokens(None, None));
        assert!(session.is_authenticated("v").await);
    }

    #[tokio::test]
    async fn store_restores_saved_logins() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("t.json"));
        let far = unix_now() + 10_000;
        store.save("todo", "carol", &tokens(Some(far), None)).unwrap();

        let session = DelegatedSession::new("todo", config("http://127.0.0.1:9/token", false))
            .with_store(store.clone());
        assert!(session.is_authenticated("carol").await);
        session.logout("carol");
        assert!(store.load("todo", "carol").is_none());
    }
}
