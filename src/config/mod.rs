// ABOUTME: Configuration types and parsing for tether.yml.
// ABOUTME: Handles YAML parsing, host lists, credentials and destination merging.

mod auth;
mod deserialize;
mod host;
mod init;

pub use auth::{AuthConfig, SecretValue};
pub use host::HostConfig;
pub use init::init_config;

use crate::error::{Error, Result};
use crate::gateway::normalize_timeout;
use crate::ssh::{Credentials, TransportConfig};
use deserialize::{deserialize_hosts, deserialize_hosts_option};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "tether.yml";
pub const CONFIG_FILENAME_ALT: &str = "tether.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".tether/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_hosts")]
    pub hosts: NonEmpty<HostConfig>,

    /// Login user for hosts that do not name one.
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Connect, command and read timeout. `0s` disables it.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub trust_first_connection: bool,

    #[serde(default)]
    pub known_hosts: Option<PathBuf>,

    #[serde(default)]
    pub destinations: HashMap<String, Destination>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Destination {
    #[serde(default, deserialize_with = "deserialize_hosts_option")]
    pub hosts: Option<NonEmpty<HostConfig>>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn for_destination(&self, name: &str) -> Result<Config> {
        let dest = self
            .destinations
            .get(name)
            .ok_or_else(|| Error::UnknownDestination(name.to_string()))?;

        let mut merged = self.clone();

        if let Some(ref hosts) = dest.hosts {
            merged.hosts = hosts.clone();
        }

        if dest.user.is_some() {
            merged.user = dest.user.clone();
        }

        if let Some(ref auth) = dest.auth {
            merged.auth = auth.clone();
        }

        Ok(merged)
    }

    /// Timeout to hand to gateways, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        normalize_timeout(Some(self.timeout))
    }

    /// Login user for a host: the host's own, then the configured default,
    /// then `$USER`, then `root`.
    pub fn user_for(&self, host: &HostConfig) -> String {
        host.user
            .clone()
            .or_else(|| self.user.clone())
            .unwrap_or_else(|| std::env::var("USER").unwrap_or_else(|_| "root".to_string()))
    }

    /// Credentials for a host, preferring its own `auth` section.
    pub fn credentials_for(&self, host: &HostConfig) -> Result<Credentials> {
        host.auth.as_ref().unwrap_or(&self.auth).resolve()
    }

    pub fn transport_config(&self) -> TransportConfig {
        let mut config = TransportConfig::default().trust_on_first_use(self.trust_first_connection);
        if let Some(ref path) = self.known_hosts {
            config = config.known_hosts_path(path);
        }
        config
    }
}
