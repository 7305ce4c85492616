// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates tether.yml template files.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::HostSpec;

use super::CONFIG_FILENAME;

pub fn init_config(dir: &Path, host: Option<&str>, user: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let host = host.unwrap_or("server.example.com");
    HostSpec::parse(host).map_err(|e| Error::InvalidConfig(format!("host '{}': {}", host, e)))?;

    let yaml = generate_template_yaml(host, user.unwrap_or("deploy"));
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(host: &str, user: &str) -> String {
    format!(
        r#"hosts:
  - "{host}"
user: {user}
timeout: 30s

# Exactly one method is used, in this order: agent, key, password.
auth:
  agent: true
  # key_path: ~/.ssh/id_ed25519
  # passphrase: {{ env: TETHER_KEY_PASSPHRASE }}
  # password: {{ env: TETHER_PASSWORD }}

# SSH host key verification (default: false for security)
# Set to true to enable Trust-On-First-Use, or pre-populate ~/.ssh/known_hosts
# trust_first_connection: true
"#
    )
}
