//! Persistent storage: the server's TOML configuration.

pub mod config;

pub use config::{load_config, save_config, AppConfig, ConfigError, ServerConfig};
