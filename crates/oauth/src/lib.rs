pub mod defaults;
pub mod flow;
pub mod pkce;
pub mod session;
pub mod storage;
pub mod types;

pub use {
    defaults::{PLANNER, TODO, load_oauth_config},
    flow::OAuthFlow,
    session::DelegatedSession,
    storage::TokenStore,
    types::{OAuthConfig, OAuthTokens, PkceChallenge, serialize_option_secret, serialize_secret},
};
