use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

/// OAuth client registration for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Confidential clients send this on every token request.
    #[serde(default, serialize_with = "serialize_option_secret")]
    pub client_secret: Option<Secret<String>>,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub use_pkce: bool,
    #[serde(default)]
    pub extra_auth_params: Vec<(String, String)>,
}

impl OAuthConfig {
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

/// Tokens returned by the token endpoint, with absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    #[serde(default, serialize_with = "serialize_option_secret")]
    pub refresh_token: Option<Secret<String>>,
    /// Unix seconds when the tokens were received.
    pub received_at: u64,
    /// Unix seconds when the access token expires, if the server said.
    #[serde(default)]
    pub expires_at: Option<u64>,
}

impl OAuthTokens {
    /// True when the token is missing an expiry or expires within `buffer_secs` of `now`.
    pub fn is_expired(&self, now: u64, buffer_secs: u64) -> bool {
        match self.expires_at {
            Some(exp) => now + buffer_secs >= exp,
            None => true,
        }
    }
}

pub fn serialize_secret<S: Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

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

    fn tokens(expires_at: Option<u64>) -> OAuthTokens {
        OAuthTokens {
            access_token: Secret::new("at".into()),
            refresh_token: None,
            received_at: 1_000,
            expires_at,
        }
    }

    #[test]
    fn expiry_uses_buffer() {
        let t = tokens(Some(4_600));
        assert!(!t.is_expired(4_000, 300));
        assert!(t.is_expired(4_300, 300));
        assert!(tokens(None).is_expired(0, 0));
    }

    #[test]
    fn tokens_round_trip_through_json() {
        let mut t = tokens(Some(10));
        t.refresh_token = Some(Secret::new("rt".into()));
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"access_token\":\"at\""));
        let back: OAuthTokens = serde_json::from_str(&json).unwrap();
        assert_eq!(back.refresh_token.unwrap().expose_secret(), "rt");
        assert_eq!(back.expires_at, Some(10));
    }
}
