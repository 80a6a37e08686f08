use std::time::{SystemTime, UNIX_EPOCH};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
};

use crate::types::{OAuthConfig, OAuthTokens, PkceChallenge};

/// Authorization-code flow against one provider.
#[derive(Debug, Clone)]
pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Deserialize, Default)]
struct TokenError {
    error: Option<String>,
    error_description: Option<String>,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorize URL for `state`, adding the S256 challenge when PKCE is used.
    pub fn authorization_url(
        &self,
        state: &str,
        pkce: Option<&PkceChallenge>,
    ) -> anyhow::Result<String> {
        let mut url = url::Url::parse(&self.config.auth_url)?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("client_id", &self.config.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", &self.config.redirect_uri)
                .append_pair("scope", &self.config.scope_string())
                .append_pair("state", state);
            if let Some(p) = pkce {
                q.append_pair("code_challenge", &p.challenge)
                    .append_pair("code_challenge_method", "S256");
            }
            for (k, v) in &self.config.extra_auth_params {
                q.append_pair(k, v);
            }
        }
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange(&self, code: &str, verifier: Option<&str>) -> anyhow::Result<OAuthTokens> {
        let mut form = self.base_form("authorization_code");
        form.push(("code", code.to_string()));
        form.push(("redirect_uri", self.config.redirect_uri.clone()));
        if let Some(v) = verifier {
            form.push(("code_verifier", v.to_string()));
        }
        self.token_request(&form).await
    }

    /// Obtain a fresh access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &Secret<String>) -> anyhow::Result<OAuthTokens> {
        let mut form = self.base_form("refresh_token");
        form.push(("refresh_token", refresh_token.expose_secret().clone()));
        self.token_request(&form).await
    }

    fn base_form(&self, grant_type: &str) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("client_id", self.config.client_id.clone()),
            ("grant_type", grant_type.to_string()),
            ("scope", self.config.scope_string()),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.expose_secret().clone()));
        }
        form
    }

    async fn token_request(&self, form: &[(&'static str, String)]) -> anyhow::Result<OAuthTokens> {
        let resp = self
            .client
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err: TokenError = serde_json::from_str(&body).unwrap_or_default();
            anyhow::bail!(
                "OAuth error ({}): {}",
                err.error.as_deref().unwrap_or("Unknown"),
                err.error_description.as_deref().unwrap_or("Unknown error")
            );
        }

        let token: TokenResponse = resp.json().await?;
        let now = unix_now();
        debug!(expires_in = ?token.expires_in, "token endpoint returned tokens");
        Ok(OAuthTokens {
            access_token: Secret::new(token.access_token),
            refresh_token: token.refresh_token.map(Secret::new),
            received_at: now,
            expires_at: token.expires_in.map(|s| now + s),
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher};

    fn config(token_url: String) -> OAuthConfig {
        OAuthConfig {
            client_id: "cid".into(),
            client_secret: None,
            auth_url: "https://login.example/authorize".into(),
            token_url,
            redirect_uri: "http://localhost:8001/project/auth/callback".into(),
            scopes: vec!["User.Read".into(), "Tasks.Read".into()],
            use_pkce: true,
            extra_auth_params: vec![("response_mode".into(), "query".into())],
        }
    }

    #[test]
    fn authorization_url_carries_pkce_and_extras() {
        let flow = OAuthFlow::new(config("https://login.example/token".into()));
        let pkce = PkceChallenge {
            verifier: "v".into(),
            challenge: "c".into(),
        };
        let url = url::Url::parse(&flow.authorization_url("st", Some(&pkce)).unwrap()).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "cid");
        assert_eq!(pairs["scope"], "User.Read Tasks.Read");
        assert_eq!(pairs["state"], "st");
        assert_eq!(pairs["code_challenge"], "c");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["response_mode"], "query");
    }

    #[tokio::test]
    async fn exchange_sends_verifier_and_computes_expiry() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "abc".into()),
                Matcher::UrlEncoded("code_verifier".into(), "ver".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"AT","refresh_token":"RT","expires_in":3600}"#)
            .create_async()
            .await;

        let flow = OAuthFlow::new(config(format!("{}/token", server.url())));
        let tokens = flow.exchange("abc", Some("ver")).await.unwrap();
        m.assert_async().await;
        assert_eq!(tokens.access_token.expose_secret(), "AT");
        assert_eq!(tokens.expires_at, Some(tokens.received_at + 3600));
    }

    #[tokio::test]
    async fn error_body_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Code expired"}"#)
            .create_async()
            .await;

        let flow = OAuthFlow::new(config(format!("{}/token", server.url())));
        let err = flow.exchange("abc", None).await.unwrap_err();
        assert_eq!(err.to_string(), "OAuth error (invalid_grant): Code expired");
    }

    #[tokio::test]
    async fn refresh_sends_client_secret() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "old".into()),
                Matcher::UrlEncoded("client_secret".into(), "shh".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"new","expires_in":60}"#)
            .create_async()
            .await;

        let mut cfg = config(format!("{}/token", server.url()));
        cfg.client_secret = Some(Secret::new("shh".into()));
        let tokens = OAuthFlow::new(cfg)
            .refresh(&Secret::new("old".into()))
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(tokens.access_token.expose_secret(), "new");
        assert!(tokens.refresh_token.is_none());
    }
}
