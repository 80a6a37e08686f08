//! Configuration for the internal assistant.
//!
//! A config file (`assistant.toml`, `.yaml`, `.yml` or `.json`) is discovered,
//! `${VAR}` placeholders are expanded, and finally the well-known Azure / Microsoft
//! environment variables override whatever the file said.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{apply_env_overrides, config_dir, data_dir, discover_and_load, load_config},
    schema::{
        AssistantConfig, AzureOpenAiConfig, BlobConfig, CosmosConfig, DocIntelConfig,
        IdentityConfig, MemoryConfig, NotifyConfig, QdrantConfig, RagConfig, RedisConfig,
        ServerConfig,
    },
};
