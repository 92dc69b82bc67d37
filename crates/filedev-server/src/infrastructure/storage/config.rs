//! TOML-based configuration for the file server.
//!
//! The server looks for its config in this order:
//! 1. the path passed with `--config`;
//! 2. the platform config file:
//!    - Windows:  `%APPDATA%\filedev\server.toml`
//!    - Linux:    `~/.config/filedev/server.toml`
//!    - macOS:    `~/Library/Application Support/filedev/server.toml`
//! 3. built-in defaults.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 10001
//! root = "/srv/filedev"
//! log_level = "info"
//! ```
//!
//! Every field carries a `#[serde(default = ...)]`, so a file may list only
//! the values it changes.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    BindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level file server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
}

/// Listener and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port clients connect to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served to clients; nothing outside it is reachable.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ServerConfig {
    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BindAddress`] if `bind_address` does not parse.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    10001
}
fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            root: default_root(),
            log_level: default_log_level(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the platform config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("server.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from `path`, or from the platform config file when `path`
/// is `None`.
///
/// A missing platform file yields [`AppConfig::default()`]; a missing explicit
/// file is an error.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match config_file_path() {
            Ok(path) => (path, false),
            Err(ConfigError::NoPlatformConfigDir) => return Ok(AppConfig::default()),
            Err(e) => return Err(e),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            Ok(AppConfig::default())
        }
        Err(source) => Err(ConfigError::Io { path, source }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory, including the `filedev`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("filedev"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("filedev"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("filedev")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("filedev_config_{}", Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_server_config_defaults() {
        // Arrange / Act
        let cfg = ServerConfig::default();

        // Assert
        assert_eq!(cfg.port, 10001);
        assert_eq!(cfg.bind_address, "0.0.0.0");
        assert_eq!(cfg.root, PathBuf::from("."));
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let cfg: AppConfig = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_empty_toml_is_default_config() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let path = scratch_path("bad.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = load_config(Some(&path)).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_missing_explicit_file_is_io_error() {
        let path = scratch_path("absent.toml");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        // Arrange
        let path = scratch_path("server.toml");
        let mut cfg = AppConfig::default();
        cfg.server.port = 12345;
        cfg.server.root = PathBuf::from("/srv/assets");

        // Act
        save_config(&path, &cfg).unwrap();
        let restored = load_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(restored, cfg);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_listen_addr_parses_bind_address() {
        let mut cfg = ServerConfig::default();
        cfg.bind_address = "127.0.0.1".into();
        cfg.port = 4000;
        assert_eq!(cfg.listen_addr().unwrap(), "127.0.0.1:4000".parse().unwrap());

        cfg.bind_address = "not-an-ip".into();
        assert!(matches!(cfg.listen_addr(), Err(ConfigError::BindAddress(_))));
    }

    #[test]
    fn test_config_file_path_ends_with_server_toml() {
        // Either a path or NoPlatformConfigDir in a stripped environment.
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("filedev/server.toml") || path.ends_with("filedev\\server.toml"));
        }
    }
}
