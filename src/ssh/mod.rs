// ABOUTME: SSH transport module for remote command execution.
// ABOUTME: Credential selection, key sources, transport traits, and the russh implementation.

mod auth;
mod client;
mod decode;
mod error;
mod keys;
mod transport;

pub use auth::{AuthConfigError, Authenticator, Credentials, select_authenticator};
pub use client::{RusshSession, RusshTransport, TransportConfig};
pub use error::{Error, Result};
pub use keys::{FsKeySource, KeyMaterialSource};
pub use transport::{Transport, TransportSession};
