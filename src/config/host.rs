// ABOUTME: Host entries for the configuration file.
// ABOUTME: Parses "[user@]host[:port]" strings, including bracketed IPv6 literals.

use super::AuthConfig;
use crate::types::{HostSpec, HostSpecError};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// Raw host string, optionally carrying a port.
    pub host: String,
    /// Port override; takes precedence over a port in `host`.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    /// Per-host credentials, replacing the top-level `auth` section.
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl HostConfig {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("host cannot be empty".to_string());
        }

        // Parse format: [user@]host[:port]
        let (user, host) = match s.split_once('@') {
            Some((user, _)) if user.is_empty() => {
                return Err(format!("empty user in '{}'", s));
            }
            Some((user, host)) => (Some(user.to_string()), host),
            None => (None, s),
        };

        let entry = HostConfig {
            host: host.to_string(),
            port: None,
            user,
            auth: None,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Resolve the address and port this entry points at.
    pub fn spec(&self) -> Result<HostSpec, HostSpecError> {
        match self.port {
            Some(port) => HostSpec::with_port(&self.host, port),
            None => HostSpec::parse(&self.host),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        self.spec()
            .map(|_| ())
            .map_err(|e| format!("invalid host '{}': {}", self.host, e))
    }
}
