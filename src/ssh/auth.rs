// ABOUTME: Credential descriptors and authenticator selection.
// ABOUTME: Resolves agent, key material or password with fixed agent > key > password precedence.

use super::keys::KeyMaterialSource;
use russh::keys::decode_secret_key;
use russh::keys::ssh_key::PrivateKey;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Credentials as supplied by the caller, before resolution.
///
/// Several kinds may be filled in at once; [`select_authenticator`] decides
/// which one is used.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Delegate signing to the running SSH agent.
    pub agent: bool,
    /// Path to a private key file.
    pub key_path: Option<PathBuf>,
    /// Inline private key text.
    pub key: Option<String>,
    /// Passphrase for an encrypted private key.
    pub passphrase: Option<String>,
    /// Plain password.
    pub password: Option<String>,
}

impl Credentials {
    pub fn agent() -> Self {
        Self {
            agent: true,
            ..Default::default()
        }
    }

    pub fn key_file(path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn key_text(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn password(secret: impl Into<String>) -> Self {
        Self {
            password: Some(secret.into()),
            ..Default::default()
        }
    }

    pub fn with_agent(mut self, agent: bool) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_password(mut self, secret: impl Into<String>) -> Self {
        self.password = Some(secret.into());
        self
    }

    fn key_path_set(&self) -> Option<&PathBuf> {
        self.key_path
            .as_ref()
            .filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
    }

    fn key_text_set(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("agent", &self.agent)
            .field("key_path", &self.key_path)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A resolved, ready-to-use authenticator consumed by the transport login.
#[derive(Clone)]
pub enum Authenticator {
    Agent,
    Key(Arc<PrivateKey>),
    Password(String),
}

impl Authenticator {
    /// Short name of the method, for logs.
    pub fn method(&self) -> &'static str {
        match self {
            Authenticator::Agent => "agent",
            Authenticator::Key(_) => "key",
            Authenticator::Password(_) => "password",
        }
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authenticator::Agent => f.write_str("Agent"),
            Authenticator::Key(key) => f
                .debug_tuple("Key")
                .field(&key.algorithm().as_str())
                .finish(),
            Authenticator::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// Errors resolving credentials into an authenticator.
#[derive(Debug, Error)]
pub enum AuthConfigError {
    #[error("no usable credential: set agent, a private key or a password")]
    NoCredentials,

    #[error("failed to read key from {}: {source}", path.display())]
    KeyRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("key material from {origin} is not valid UTF-8")]
    KeyEncoding { origin: String },

    #[error("failed to decode key from {origin}: {source}")]
    InvalidKey {
        origin: String,
        source: russh::keys::Error,
    },
}

/// Pick the authenticator for a connection attempt.
///
/// Precedence is agent, then key material (file before inline text), then
/// password. Once a kind is chosen its failures are returned as-is; there is
/// no fallthrough to the next kind.
pub fn select_authenticator(
    credentials: &Credentials,
    keys: &impl KeyMaterialSource,
) -> Result<Authenticator, AuthConfigError> {
    if credentials.agent {
        return Ok(Authenticator::Agent);
    }

    if let Some(path) = credentials.key_path_set() {
        let bytes = keys
            .read_bytes(path)
            .map_err(|source| AuthConfigError::KeyRead {
                path: path.clone(),
                source,
            })?;
        let origin = path.display().to_string();
        let text = String::from_utf8(bytes).map_err(|_| AuthConfigError::KeyEncoding {
            origin: origin.clone(),
        })?;
        return decode_key(&text, credentials.passphrase.as_deref(), origin);
    }

    if let Some(text) = credentials.key_text_set() {
        return decode_key(
            text,
            credentials.passphrase.as_deref(),
            "inline key".to_string(),
        );
    }

    match &credentials.password {
        Some(secret) => Ok(Authenticator::Password(secret.clone())),
        None => Err(AuthConfigError::NoCredentials),
    }
}

fn decode_key(
    text: &str,
    passphrase: Option<&str>,
    origin: String,
) -> Result<Authenticator, AuthConfigError> {
    let passphrase = passphrase.filter(|p| !p.is_empty());
    let key = decode_secret_key(text, passphrase)
        .map_err(|source| AuthConfigError::InvalidKey { origin, source })?;
    Ok(Authenticator::Key(Arc::new(key)))
}
