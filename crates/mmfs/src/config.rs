//! Mount configuration
//!
//! Settings come from command-line flags and an optional TOML file
//! (`~/.config/mmfs/config.toml` by default). Flags win over the file.
//!
//! ```toml
//! server = "https://chat.example.com"
//! username = "alice"
//! password = "hunter2"
//! ca_cert = "/etc/ssl/private-ca.pem"
//! timeout_secs = 30
//! allow_other = false
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use client::client::ClientConfig;
use serde::{Deserialize, Serialize};
use url::Url;

pub const APP_NAME: &str = "mmfs";
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Environment variable the password can be supplied through
pub const PASSWORD_ENV: &str = "MMFS_PASSWORD";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A password that never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl From<String> for Password {
    fn from(password: String) -> Self {
        Self(password)
    }
}

/// Contents of the TOML config file; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: Option<Url>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Password>,
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub allow_other: Option<bool>,
}

impl FileConfig {
    /// `<config dir>/mmfs/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDirectory)?;
        Ok(dir.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load an explicitly named file, or the default file if there is one.
    ///
    /// An explicit path must exist; a missing default file is an empty config.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let path = match Self::default_path() {
            Ok(path) => path,
            Err(_) => return Ok(Self::default()),
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        tracing::debug!(path = %path.display(), "loading config file");
        Self::load(&path)
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<Url>,
    pub username: Option<String>,
    pub password: Option<Password>,
    pub ca_cert: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub allow_other: bool,
}

/// Everything needed to mount, after merging flags and file
#[derive(Debug, Clone)]
pub struct MountConfig {
    pub mount_point: PathBuf,
    pub server: Url,
    pub username: String,
    pub password: Password,
    pub ca_cert: Option<PathBuf>,
    pub timeout: Duration,
    pub allow_other: bool,
}

impl MountConfig {
    pub fn resolve(
        mount_point: PathBuf,
        overrides: Overrides,
        file: FileConfig,
    ) -> Result<Self, ConfigError> {
        let server = overrides
            .server
            .or(file.server)
            .ok_or(ConfigError::Missing("server"))?;
        let username = overrides
            .username
            .or(file.username)
            .ok_or(ConfigError::Missing("username"))?;
        let password = overrides
            .password
            .or(file.password)
            .ok_or(ConfigError::Missing("password"))?;
        let timeout_secs = overrides
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            mount_point,
            server,
            username,
            password,
            ca_cert: overrides.ca_cert.or(file.ca_cert),
            timeout: Duration::from_secs(timeout_secs),
            allow_other: overrides.allow_other || file.allow_other.unwrap_or(false),
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server: self.server.clone(),
            ca_cert: self.ca_cert.clone(),
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting '{0}' (pass it as a flag or set it in the config file)")]
    Missing(&'static str),

    #[error("no config directory found")]
    NoConfigDirectory,

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
