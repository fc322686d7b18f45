//! # Gateway Config
//!
//! Configuration for the Claude Router gateway.
//!
//! Configuration is read from `~/.claude-router/config.json` and then
//! overridden from the environment. A missing file is not an error: the
//! gateway can run from environment variables alone.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod target;

pub use config::{
    ClientCacheConfig, GatewayConfig, LogFormat, ProviderConfig, RouterConfig, RouterTargets,
};
pub use error::ConfigError;
pub use target::RouteTarget;

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory under the home directory holding gateway state
pub const CONFIG_DIR_NAME: &str = ".claude-router";
/// Config file name
pub const CONFIG_FILE_NAME: &str = "config.json";
/// PID file name
pub const PID_FILE_NAME: &str = ".claude-router.pid";

/// `~/.claude-router`
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

/// `~/.claude-router/config.json`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// `~/.claude-router/.claude-router.pid`
pub fn pid_file_path() -> Result<PathBuf, ConfigError> {
    config_dir().map(|dir| dir.join(PID_FILE_NAME))
}

/// Load configuration from the default path
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    load_config_from(&default_config_path()?).await
}

/// Load configuration from `path`, apply environment overrides, validate
pub async fn load_config_from(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let mut config = read_config_file(path).await?;
    config.apply_env_overrides();
    config.validate()?;

    info!(
        path = %path.display(),
        providers = config.providers.len(),
        default_provider = config.has_default_provider(),
        "Configuration loaded"
    );

    Ok(config)
}

/// Read and parse the file without overrides; missing file yields defaults
pub async fn read_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => GatewayConfig::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Config file not found, using environment only");
            Ok(GatewayConfig::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
