// ABOUTME: Authentication section of the configuration file.
// ABOUTME: Resolves env-interpolated secrets into gateway credentials.

use crate::error::{Error, Result};
use crate::ssh::Credentials;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Use the running SSH agent.
    #[serde(default)]
    pub agent: bool,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Inline private key text.
    #[serde(default)]
    pub key: Option<SecretValue>,
    #[serde(default)]
    pub passphrase: Option<SecretValue>,
    #[serde(default)]
    pub password: Option<SecretValue>,
}

impl AuthConfig {
    /// Resolve env references into credentials.
    pub fn resolve(&self) -> Result<Credentials> {
        Ok(Credentials {
            agent: self.agent,
            key_path: self.key_path.clone(),
            key: resolve_opt(&self.key)?,
            passphrase: resolve_opt(&self.passphrase)?,
            password: resolve_opt(&self.password)?,
        })
    }

    /// Method that will be selected, following agent > key > password.
    pub fn method(&self) -> &'static str {
        if self.agent {
            "agent"
        } else if self.has_key_path() || self.key.as_ref().is_some_and(|k| !k.is_blank()) {
            "key"
        } else if self.password.is_some() {
            "password"
        } else {
            "none"
        }
    }

    fn has_key_path(&self) -> bool {
        self.key_path
            .as_ref()
            .is_some_and(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
    }
}

fn resolve_opt(value: &Option<SecretValue>) -> Result<Option<String>> {
    value.as_ref().map(SecretValue::resolve).transpose()
}

/// A secret given inline or read from an environment variable.
///
/// ```yaml
/// password: { env: DEPLOY_PASSWORD }
/// passphrase: { env: KEY_PASSPHRASE, default: "" }
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SecretValue {
    Literal(String),
    FromEnv {
        env: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl SecretValue {
    /// Whether this is an inline value with nothing but whitespace.
    /// Env references are never blank until resolved.
    pub fn is_blank(&self) -> bool {
        matches!(self, SecretValue::Literal(s) if s.trim().is_empty())
    }

    pub fn resolve(&self) -> Result<String> {
        match self {
            SecretValue::Literal(s) => Ok(s.clone()),
            SecretValue::FromEnv { env, default } => std::env::var(env)
                .ok()
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(env.clone())),
        }
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretValue::Literal(_) => f.write_str("Literal(<redacted>)"),
            SecretValue::FromEnv { env, .. } => f.debug_struct("FromEnv").field("env", env).finish(),
        }
    }
}

