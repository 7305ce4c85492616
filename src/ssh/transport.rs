// ABOUTME: Capability traits for the secure transport under the gateway.
// ABOUTME: Open a session, log in, run one streaming command, and read its output and status.

use super::auth::Authenticator;
use super::error::Result;
use crate::types::HostSpec;
use async_trait::async_trait;
use std::time::Duration;

/// Opens sessions to remote hosts.
#[async_trait]
pub trait Transport: Send + Sync {
    type Session: TransportSession;

    /// Connect to `host`. `timeout` bounds the connection attempt and is
    /// kept by the session for later operations.
    async fn open(&self, host: &HostSpec, timeout: Option<Duration>) -> Result<Self::Session>;
}

/// An open session to one host.
///
/// At most one command runs at a time: `exec_streaming` starts it,
/// `next_chunk` drains it, `exit_status` reports how it ended.
#[async_trait]
pub trait TransportSession: Send {
    /// Authenticate. `Ok(false)` means the server rejected the credentials.
    async fn login(&mut self, username: &str, auth: &Authenticator) -> Result<bool>;

    fn is_connected(&self) -> bool;

    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Start `command` and return without waiting for it to finish.
    async fn exec_streaming(&mut self, command: &str) -> Result<()>;

    /// Next chunk of output, or `None` once the stream has ended.
    async fn next_chunk(&mut self) -> Result<Option<String>>;

    /// Exit status of the current command, if it has been reported.
    fn exit_status(&self) -> Option<u32>;

    async fn close(&mut self) -> Result<()>;
}
