// ABOUTME: Remote command gateway interface and its SSH implementation.
// ABOUTME: Defines the Gateway trait, disabled file operations, and timeout helpers.

mod error;
mod remote;

pub use error::{GatewayError, GatewayErrorKind, Result};
pub use remote::RemoteGateway;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Interface orchestration code drives to run commands on one host.
///
/// Commands follow `run` → `next_line` until `None` → `status`. File
/// operations are part of the interface, but implementations may refuse them
/// with [`GatewayError::Unsupported`].
#[async_trait]
pub trait Gateway: Send {
    /// Log in as `username`, opening the session first if needed.
    async fn connect(&mut self, username: &str) -> Result<()>;

    /// Whether the underlying session is alive.
    fn connected(&self) -> bool;

    /// Change the timeout. `None` or zero disables it.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Drop the session and any running command. Safe to call repeatedly.
    async fn disconnect(&mut self);

    /// Start a command without waiting for it to finish.
    async fn run(&mut self, command: &str) -> Result<()>;

    /// Next chunk of output, `None` once the command's output has ended.
    async fn next_line(&mut self) -> Result<Option<String>>;

    /// Exit status of the last command, `None` while it is still running.
    fn status(&self) -> Result<Option<u32>>;

    /// Run a command to completion, collecting its output.
    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        self.run(command).await?;
        let mut output = String::new();
        while let Some(chunk) = self.next_line().await? {
            output.push_str(&chunk);
        }
        Ok(CommandOutput {
            exit_code: self.status()?,
            output,
        })
    }

    async fn get(&mut self, remote: &str, local: &Path) -> Result<()>;

    async fn get_string(&mut self, remote: &str) -> Result<String>;

    async fn put(&mut self, local: &Path, remote: &str) -> Result<()>;

    async fn put_string(&mut self, remote: &str, contents: &str) -> Result<()>;

    async fn exists(&mut self, remote: &str) -> Result<bool>;

    async fn rename(&mut self, remote: &str, target: &str) -> Result<()>;

    async fn delete(&mut self, remote: &str) -> Result<()>;
}

/// File-transfer operations of the gateway interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileOperation {
    Get,
    GetString,
    Put,
    PutString,
    Exists,
    Rename,
    Delete,
}

impl FileOperation {
    pub const ALL: [FileOperation; 7] = [
        FileOperation::Get,
        FileOperation::GetString,
        FileOperation::Put,
        FileOperation::PutString,
        FileOperation::Exists,
        FileOperation::Rename,
        FileOperation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileOperation::Get => "get",
            FileOperation::GetString => "get_string",
            FileOperation::Put => "put",
            FileOperation::PutString => "put_string",
            FileOperation::Exists => "exists",
            FileOperation::Rename => "rename",
            FileOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output from a command run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, if the remote side reported one.
    pub exit_code: Option<u32>,
    /// Combined stdout and stderr in arrival order.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Convert a timeout in seconds; zero or negative means no timeout.
pub fn timeout_from_secs(seconds: i64) -> Option<Duration> {
    u64::try_from(seconds)
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}

/// Treat a zero duration as no timeout.
pub fn normalize_timeout(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|t| !t.is_zero())
}
