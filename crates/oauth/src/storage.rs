use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::Result;

use crate::types::OAuthTokens;

/// File-backed token storage, one entry per `{provider}:{user}`.
///
/// Lives at `~/.internal-assistant/oauth_tokens.json` by default so logins
/// survive restarts. The file is written with 0600 permissions on Unix.
///
/// Clones share one lock, so sessions of different providers can use the
/// same file without overwriting each other's entries.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

fn entry_key(provider: &str, user_id: &str) -> String {
    format!("{provider}:{user_id}")
}

impl TokenStore {
    pub fn new() -> Self {
        Self::with_path(assistant_config::data_dir().join("oauth_tokens.json"))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_all(&self) -> HashMap<String, OAuthTokens> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|d| serde_json::from_str(&d).ok())
            .unwrap_or_default()
    }

    fn write_all(&self, map: &HashMap<String, OAuthTokens>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(map)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn load(&self, provider: &str, user_id: &str) -> Option<OAuthTokens> {
        let _guard = self.guard();
        self.read_all().remove(&entry_key(provider, user_id))
    }

    /// Every stored user of `provider`, with their tokens.
    pub fn load_provider(&self, provider: &str) -> Vec<(String, OAuthTokens)> {
        let prefix = format!("{provider}:");
        let _guard = self.guard();
        self.read_all()
            .into_iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|user| (user.to_string(), v)))
            .collect()
    }

    pub fn save(&self, provider: &str, user_id: &str, tokens: &OAuthTokens) -> Result<()> {
        let _guard = self.guard();
        let mut map = self.read_all();
        map.insert(entry_key(provider, user_id), tokens.clone());
        self.write_all(&map)
    }

    pub fn delete(&self, provider: &str, user_id: &str) -> Result<()> {
        let _guard = self.guard();
        if !self.path.exists() {
            return Ok(());
        }
        let mut map = self.read_all();
        if map.remove(&entry_key(provider, user_id)).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}
