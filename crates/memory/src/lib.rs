//! Conversation memory: Redis short-term cache + Cosmos DB archive, one
//! history per user and feature module (`rag`, `project`, `todo`).

pub mod archive;
pub mod cache;
pub mod cosmos;
pub mod manager;
pub mod message;

use std::sync::Arc;

use {assistant_config::AssistantConfig, tracing::{info, warn}};

pub use {
    archive::{HistoryArchive, InMemoryArchive},
    cache::{HistoryCache, InMemoryHistoryCache, RedisHistoryCache},
    cosmos::CosmosArchive,
    manager::{ConversationMemory, ModuleStats, format_context},
    message::{ArchivedMessage, ChatMessage, Module},
};

/// Connect both backends. Memory is only enabled when Redis and Cosmos DB
/// are both reachable; otherwise the assistant runs without history.
pub async fn initialize(config: &AssistantConfig) -> Option<Arc<ConversationMemory>> {
    let cache = match connect_cache(config).await {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(error = %e, "redis connection failed");
            None
        },
    };
    let archive = match connect_archive(config).await {
        Ok(archive) => Some(archive),
        Err(e) => {
            warn!(error = %e, "cosmos connection failed");
            None
        },
    };

    match (cache, archive) {
        (Some(cache), Some(archive)) => {
            info!("conversation memory enabled with module separation");
            Some(Arc::new(ConversationMemory::new(
                Arc::new(cache),
                Arc::new(archive),
                config.memory.session_ttl_secs,
                config.memory.max_history,
            )))
        },
        _ => {
            warn!("conversation memory not available, running without memory");
            None
        },
    }
}

async fn connect_cache(config: &AssistantConfig) -> anyhow::Result<RedisHistoryCache> {
    if config.redis.host.is_empty() {
        anyhow::bail!("REDIS_HOST is not set");
    }
    RedisHistoryCache::connect(&config.redis.url()).await
}

async fn connect_archive(config: &AssistantConfig) -> anyhow::Result<CosmosArchive> {
    let cosmos = &config.cosmos;
    let Some(key) = cosmos.key.clone() else {
        anyhow::bail!("COSMOS_KEY is not set");
    };
    if cosmos.endpoint.is_empty() {
        anyhow::bail!("COSMOS_ENDPOINT is not set");
    }
    let archive = CosmosArchive::new(&cosmos.endpoint, key, &cosmos.database, &cosmos.container);
    archive.ensure_container().await?;
    Ok(archive)
}
