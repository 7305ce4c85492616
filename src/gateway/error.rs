// ABOUTME: Gateway error types with SNAFU pattern.
// ABOUTME: Carries host, user and operation context and classifies failures by kind.

use snafu::Snafu;

use super::FileOperation;
use crate::ssh::{self, AuthConfigError};
use crate::types::HostSpecError;

/// Errors surfaced by a gateway to its caller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GatewayError {
    #[snafu(display("invalid host '{input}': {source}"))]
    InvalidHost {
        input: String,
        source: HostSpecError,
    },

    #[snafu(display("cannot authenticate {username}@{host}: {source}"))]
    Credentials {
        username: String,
        host: String,
        source: AuthConfigError,
    },

    #[snafu(display("SSH login failed for {username}@{host}"))]
    LoginFailed { username: String, host: String },

    #[snafu(display("{operation} on {host} failed: {source}"))]
    Transport {
        host: String,
        operation: &'static str,
        source: ssh::Error,
    },

    #[snafu(display("not connected to {host}"))]
    NotConnected { host: String },

    #[snafu(display("command '{command}' is still running; drain its output first"))]
    CommandInFlight { command: String },

    #[snafu(display("no command has been run"))]
    NoCommand,

    #[snafu(display("{operation} is not supported in SSH command mode"))]
    Unsupported { operation: FileOperation },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Malformed host, missing or undecodable credentials.
    Configuration,
    /// Key material could not be read.
    KeyAccess,
    /// The server rejected the login.
    Authentication,
    /// Connection, protocol or timeout failure.
    Transport,
    /// Disabled file-transfer operation.
    Unsupported,
    /// Operation called out of order.
    Usage,
}

impl GatewayError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            GatewayError::InvalidHost { .. } => GatewayErrorKind::Configuration,
            GatewayError::Credentials { source, .. } => match source {
                AuthConfigError::KeyRead { .. } => GatewayErrorKind::KeyAccess,
                _ => GatewayErrorKind::Configuration,
            },
            GatewayError::LoginFailed { .. } => GatewayErrorKind::Authentication,
            GatewayError::Transport { .. } => GatewayErrorKind::Transport,
            GatewayError::Unsupported { .. } => GatewayErrorKind::Unsupported,
            GatewayError::NotConnected { .. }
            | GatewayError::CommandInFlight { .. }
            | GatewayError::NoCommand => GatewayErrorKind::Usage,
        }
    }

    /// Whether this is a transport failure caused by an expired timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Transport { source, .. } if source.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
