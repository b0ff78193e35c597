//! Harness configuration
//!
//! Config precedence: CLI `--config` > `CONFIG_PATH` env var > default file
//! name. Inside the file, `AUTH_CLIENT_ID` and `AUTH_AUTHORITY` env vars
//! replace the `[auth]` values so one file can serve several app
//! registrations.

use std::path::{Path, PathBuf};

use extension_auth::AuthConfig;
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub loopback: LoopbackConfig,
}

/// Where the token record is persisted
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

/// Local redirect listener settings
#[derive(Debug, Deserialize)]
pub struct LoopbackConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Give up on the browser after this many seconds. Unset waits until Ctrl-C.
    #[serde(default)]
    pub wait_secs: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            wait_secs: None,
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("extension-auth-tokens.json")
}

fn default_port() -> u16 {
    8765
}

impl Config {
    /// Load configuration from a TOML file, overlay env vars, then validate.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(client_id) = std::env::var("AUTH_CLIENT_ID") {
            config.auth.client_id = client_id;
        }
        if let Ok(authority) = std::env::var("AUTH_AUTHORITY") {
            config.auth.authority = authority;
        }

        config.auth.validate()?;

        if config.loopback.port == 0 {
            return Err(common::Error::Config(
                "loopback.port must be a fixed, registered port".into(),
            ));
        }
        if config.loopback.wait_secs == Some(0) {
            return Err(common::Error::Config(
                "loopback.wait_secs must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("extension-auth.toml")
    }
}
