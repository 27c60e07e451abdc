//! Configuration for prophet: the server config file plus the two static
//! JSON documents (client secret, model catalog).

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod static_files;

pub use {
    error::ConfigError,
    loader::{config_dir, data_dir, discover_and_load, load_config},
    schema::{
        OAuthSettings, PredictionSettings, ProphetConfig, ServerConfig, StorageBackend,
        StorageConfig,
    },
    static_files::{
        ClientSecret, ConfigLoader, FieldDescriptor, FileConfigLoader, ModelCatalog,
        ModelDescriptor,
    },
};
