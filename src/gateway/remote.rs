// ABOUTME: SSH-backed gateway with a lazily opened, memoized session.
// ABOUTME: Selects the authenticator, logs in, and drives one streaming command at a time.

use super::error::{
    CommandInFlightSnafu, CredentialsSnafu, InvalidHostSnafu, LoginFailedSnafu, NoCommandSnafu,
    NotConnectedSnafu, Result, TransportSnafu,
};
use super::{CommandOutput, FileOperation, Gateway, GatewayError, normalize_timeout};
use crate::ssh::{
    self, Credentials, FsKeySource, KeyMaterialSource, Transport, TransportSession,
    select_authenticator,
};
use crate::types::HostSpec;
use async_trait::async_trait;
use snafu::{OptionExt, ResultExt};
use std::path::Path;
use std::time::Duration;

/// One command started on the session.
#[derive(Debug)]
struct CommandExecution {
    command: String,
    chunks_read: usize,
    exhausted: bool,
    /// Reading output failed; the command is abandoned, not drained.
    failed: bool,
    exit_status: Option<u32>,
}

impl CommandExecution {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            chunks_read: 0,
            exhausted: false,
            failed: false,
            exit_status: None,
        }
    }
}

/// Gateway that runs commands over a [`Transport`] session.
///
/// The session is opened on first use and reused until [`Gateway::disconnect`].
/// Only one command may be in flight: `run` is rejected with
/// [`GatewayError::CommandInFlight`] until the previous command's output has
/// been drained to end-of-stream or abandoned after a failed read.
pub struct RemoteGateway<T: Transport, K = FsKeySource> {
    host: HostSpec,
    credentials: Credentials,
    keys: K,
    transport: T,
    timeout: Option<Duration>,
    session: Option<T::Session>,
    execution: Option<CommandExecution>,
}

impl<T: Transport, K> std::fmt::Debug for RemoteGateway<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGateway")
            .field("host", &self.host)
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .field("session", &self.session.as_ref().map(|_| "<session>"))
            .field("execution", &self.execution)
            .finish()
    }
}

impl<T, K> RemoteGateway<T, K>
where
    T: Transport,
    K: KeyMaterialSource,
{
    /// Create a gateway for `host`. Nothing is opened until first use.
    pub fn new(
        host: &str,
        credentials: Credentials,
        keys: K,
        transport: T,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let host = HostSpec::parse(host).context(InvalidHostSnafu { input: host })?;
        Ok(Self::for_host(host, credentials, keys, transport, timeout))
    }

    /// Create a gateway for an already resolved host.
    pub fn for_host(
        host: HostSpec,
        credentials: Credentials,
        keys: K,
        transport: T,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            host,
            credentials,
            keys,
            transport,
            timeout: normalize_timeout(timeout),
            session: None,
            execution: None,
        }
    }

    pub fn host(&self) -> &HostSpec {
        &self.host
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Return the session, opening it the first time.
    pub async fn get_connection(&mut self) -> Result<&mut T::Session> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                tracing::debug!(host = %self.host, timeout = ?self.timeout, "opening session");
                self.transport
                    .open(&self.host, self.timeout)
                    .await
                    .context(TransportSnafu {
                        host: self.host.to_string(),
                        operation: "open",
                    })?
            }
        };
        Ok(self.session.insert(session))
    }

    fn host_label(&self) -> String {
        self.host.to_string()
    }
}

#[async_trait]
impl<T, K> Gateway for RemoteGateway<T, K>
where
    T: Transport,
    K: KeyMaterialSource,
{
    async fn connect(&mut self, username: &str) -> Result<()> {
        let authenticator =
            select_authenticator(&self.credentials, &self.keys).context(CredentialsSnafu {
                username,
                host: self.host_label(),
            })?;
        let host = self.host_label();

        let session = self.get_connection().await?;
        let accepted = session
            .login(username, &authenticator)
            .await
            .context(TransportSnafu {
                host: host.clone(),
                operation: "login",
            })?;

        if !accepted {
            tracing::error!(
                host = %host,
                user = username,
                method = authenticator.method(),
                "SSH login rejected"
            );
            return LoginFailedSnafu { username, host }.fail();
        }

        tracing::info!(
            host = %host,
            user = username,
            method = authenticator.method(),
            "logged in"
        );
        Ok(())
    }

    fn connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_connected())
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = normalize_timeout(timeout);
        if let Some(session) = self.session.as_mut() {
            session.set_timeout(self.timeout);
        }
    }

    async fn disconnect(&mut self) {
        self.execution = None;
        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Err(e) = session.close().await {
            tracing::warn!(host = %self.host, error = %e, "SSH disconnect failed");
        }
    }

    async fn run(&mut self, command: &str) -> Result<()> {
        if let Some(previous) = &self.execution
            && !previous.exhausted
        {
            return CommandInFlightSnafu {
                command: previous.command.clone(),
            }
            .fail();
        }

        let host = self.host_label();
        let session = self
            .session
            .as_mut()
            .context(NotConnectedSnafu { host: host.clone() })?;

        tracing::debug!(host = %host, command, "starting command");
        session
            .exec_streaming(command)
            .await
            .context(TransportSnafu {
                host,
                operation: "exec",
            })?;

        self.execution = Some(CommandExecution::new(command));
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        let execution = self.execution.as_mut().context(NoCommandSnafu)?;
        if execution.exhausted {
            return Ok(None);
        }

        let host = self.host.to_string();
        let session = self
            .session
            .as_mut()
            .context(NotConnectedSnafu { host: host.clone() })?;

        let read = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, session.next_chunk())
                .await
                .unwrap_or(Err(ssh::Error::CommandTimeout(limit))),
            None => session.next_chunk().await,
        };

        let chunk = match read {
            Ok(chunk) => chunk,
            Err(source) => {
                // A failed read ends the command; its exit status stays unknown
                execution.exhausted = true;
                execution.failed = true;
                tracing::warn!(
                    host = %host,
                    command = %execution.command,
                    error = %source,
                    "abandoning command after failed read"
                );
                return Err(source).context(TransportSnafu {
                    host,
                    operation: "read output",
                });
            }
        };

        match chunk {
            Some(chunk) => {
                execution.chunks_read += 1;
                Ok(Some(chunk))
            }
            None => {
                execution.exhausted = true;
                execution.exit_status = session.exit_status();
                tracing::debug!(
                    command = %execution.command,
                    chunks = execution.chunks_read,
                    exit_status = ?execution.exit_status,
                    "command output drained"
                );
                Ok(None)
            }
        }
    }

    fn status(&self) -> Result<Option<u32>> {
        let execution = self.execution.as_ref().context(NoCommandSnafu)?;
        if execution.failed {
            return Ok(None);
        }
        Ok(execution
            .exit_status
            .or_else(|| self.session.as_ref().and_then(|s| s.exit_status())))
    }

    async fn get(&mut self, _remote: &str, _local: &Path) -> Result<()> {
        unsupported(FileOperation::Get)
    }

    async fn get_string(&mut self, _remote: &str) -> Result<String> {
        unsupported(FileOperation::GetString)
    }

    async fn put(&mut self, _local: &Path, _remote: &str) -> Result<()> {
        unsupported(FileOperation::Put)
    }

    async fn put_string(&mut self, _remote: &str, _contents: &str) -> Result<()> {
        unsupported(FileOperation::PutString)
    }

    async fn exists(&mut self, _remote: &str) -> Result<bool> {
        unsupported(FileOperation::Exists)
    }

    async fn rename(&mut self, _remote: &str, _target: &str) -> Result<()> {
        unsupported(FileOperation::Rename)
    }

    async fn delete(&mut self, _remote: &str) -> Result<()> {
        unsupported(FileOperation::Delete)
    }
}

fn unsupported<T>(operation: FileOperation) -> Result<T> {
    tracing::debug!(%operation, "refusing file operation");
    Err(GatewayError::Unsupported { operation })
}

impl<T, K> RemoteGateway<T, K>
where
    T: Transport,
    K: KeyMaterialSource,
{
    /// Connect, run one command to completion, and disconnect.
    pub async fn run_once(&mut self, username: &str, command: &str) -> Result<CommandOutput> {
        self.connect(username).await?;
        let result = self.exec(command).await;
        self.disconnect().await;
        result
    }
}
