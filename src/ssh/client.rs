// ABOUTME: SSH transport implementation using russh.
// ABOUTME: Handles connection, host key verification, login and streaming command execution.

use super::auth::Authenticator;
use super::decode::ChunkDecoder;
use super::error::{Error, Result};
use super::transport::{Transport, TransportSession};
use crate::types::HostSpec;
use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect, Sig};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Settings for the russh transport.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts will fail.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Close the connection after this long without traffic.
    pub inactivity_timeout: Option<Duration>,
}

impl TransportConfig {
    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = Some(timeout);
        self
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) if self.trust_on_first_use => {
                tracing::warn!(
                    host = %self.host,
                    port = self.port,
                    "Trust-On-First-Use: accepting unknown host key"
                );
                let learn_result = match &self.known_hosts_path {
                    Some(path) => {
                        learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                    }
                    None => learn_known_hosts(&self.host, self.port, server_public_key),
                };
                if let Err(e) = learn_result {
                    tracing::warn!("Failed to save host key to known_hosts: {}", e);
                }
                Ok(true)
            }
            Ok(false) => {
                tracing::warn!(host = %self.host, port = self.port, "unknown host key rejected");
                Ok(false)
            }
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!(host = %self.host, "host key does not match known_hosts entry");
                Ok(false)
            }
            Err(_) => Ok(self.trust_on_first_use),
        }
    }
}

/// Transport that opens real SSH connections.
#[derive(Debug, Clone, Default)]
pub struct RusshTransport {
    config: TransportConfig,
}

impl RusshTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for RusshTransport {
    type Session = RusshSession;

    async fn open(&self, host: &HostSpec, timeout: Option<Duration>) -> Result<RusshSession> {
        let russh_config = Config {
            inactivity_timeout: self.config.inactivity_timeout,
            ..Default::default()
        };

        let handler = SshHandler {
            host: host.connect_host().to_string(),
            port: host.port(),
            trust_on_first_use: self.config.trust_on_first_use,
            known_hosts_path: self.config.known_hosts_path.clone(),
        };

        tracing::debug!(host = %host, "opening SSH connection");

        let connecting = client::connect(
            Arc::new(russh_config),
            (host.connect_host(), host.port()),
            handler,
        );
        let handle = match timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| Error::ConnectTimeout(limit))?,
            None => connecting.await,
        }
        .map_err(|e| {
            if e.to_string().contains("Connection refused") {
                Error::Connection(format!("connection refused to {}", host))
            } else {
                Error::Connection(e.to_string())
            }
        })?;

        Ok(RusshSession {
            handle,
            timeout,
            channel: None,
            stdout: ChunkDecoder::default(),
            stderr: ChunkDecoder::default(),
            exit_status: None,
            exited: false,
            eof: false,
            drained: false,
        })
    }
}

/// An open russh connection with at most one running command.
pub struct RusshSession {
    handle: Handle<SshHandler>,
    timeout: Option<Duration>,
    channel: Option<Channel<Msg>>,
    stdout: ChunkDecoder,
    stderr: ChunkDecoder,
    exit_status: Option<u32>,
    /// Set by either an exit status or an exit signal.
    exited: bool,
    eof: bool,
    drained: bool,
}

impl std::fmt::Debug for RusshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshSession")
            .field("handle", &"<russh::Handle>")
            .field("timeout", &self.timeout)
            .field("running", &self.channel.is_some())
            .field("exit_status", &self.exit_status)
            .finish()
    }
}

async fn bounded<T>(timeout: Option<Duration>, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::CommandTimeout(limit))?,
        None => fut.await,
    }
}

impl RusshSession {
    async fn login_with_agent(&mut self, username: &str) -> Result<bool> {
        let mut agent = AgentClient::connect_env()
            .await
            .map_err(|e| Error::AgentUnavailable(e.to_string()))?;

        let keys = agent
            .request_identities()
            .await
            .map_err(|e| Error::AgentUnavailable(format!("failed to list agent keys: {}", e)))?;

        if keys.is_empty() {
            return Err(Error::AgentUnavailable("no keys in SSH agent".to_string()));
        }

        for key in &keys {
            match self
                .handle
                .authenticate_publickey_with(username, key.clone(), None, &mut agent)
                .await
            {
                Ok(result) if result.success() => return Ok(true),
                Ok(_) => tracing::debug!(user = username, "agent identity rejected"),
                Err(_) => tracing::debug!(user = username, "agent signing failed"),
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl TransportSession for RusshSession {
    async fn login(&mut self, username: &str, auth: &Authenticator) -> Result<bool> {
        match auth {
            Authenticator::Agent => self.login_with_agent(username).await,
            Authenticator::Key(key) => {
                let hash_alg = self.handle.best_supported_rsa_hash().await?.flatten();

                let result = self
                    .handle
                    .authenticate_publickey(
                        username,
                        PrivateKeyWithHashAlg::new(Arc::clone(key), hash_alg),
                    )
                    .await?;

                Ok(result.success())
            }
            Authenticator::Password(secret) => {
                let result = self
                    .handle
                    .authenticate_password(username, secret.as_str())
                    .await?;
                Ok(result.success())
            }
        }
    }

    fn is_connected(&self) -> bool {
        !self.handle.is_closed()
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    async fn exec_streaming(&mut self, command: &str) -> Result<()> {
        let handle = &self.handle;
        let channel = bounded(self.timeout, async {
            let channel = handle
                .channel_open_session()
                .await
                .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;
            channel
                .exec(true, command)
                .await
                .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;
            Ok::<_, Error>(channel)
        })
        .await?;

        self.channel = Some(channel);
        self.stdout.reset();
        self.stderr.reset();
        self.exit_status = None;
        self.exited = false;
        self.eof = false;
        self.drained = false;
        Ok(())
    }

    async fn next_chunk(&mut self) -> Result<Option<String>> {
        let Some(channel) = self.channel.as_mut() else {
            return Err(Error::NoChannel);
        };

        while !self.drained {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    if let Some(text) = self.stdout.push(&data) {
                        return Ok(Some(text));
                    }
                }
                // stderr is interleaved with stdout in arrival order
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                    if let Some(text) = self.stderr.push(&data) {
                        return Ok(Some(text));
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    self.exited = true;
                    self.exit_status = Some(exit_status);
                    self.drained = self.eof;
                }
                Some(ChannelMsg::ExitSignal {
                    signal_name,
                    core_dumped,
                    ..
                }) => {
                    tracing::debug!(signal = ?signal_name, core_dumped, "command killed by signal");
                    self.exited = true;
                    self.exit_status = signal_exit_status(&signal_name);
                    self.drained = self.eof;
                }
                Some(ChannelMsg::Eof) => {
                    self.eof = true;
                    self.drained = self.exited;
                }
                Some(ChannelMsg::Close) | None => self.drained = true,
                Some(_) => {}
            }
        }

        if let Some(rest) = self.stdout.finish().or_else(|| self.stderr.finish()) {
            return Ok(Some(rest));
        }

        self.channel = None;

        // Closing without an exit status or signal means the command died
        // with the connection rather than finishing.
        if !self.exited {
            return Err(Error::ChannelClosed);
        }
        Ok(None)
    }

    fn exit_status(&self) -> Option<u32> {
        self.exit_status
    }

    async fn close(&mut self) -> Result<()> {
        self.channel = None;
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// Exit status for a command killed by `signal`, following the shell's
/// `128 + signal number` convention. Signals without a portable number map
/// to `None`.
fn signal_exit_status(signal: &Sig) -> Option<u32> {
    let number = match signal {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        _ => return None,
    };
    Some(128 + number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_deaths_follow_shell_convention() {
        assert_eq!(signal_exit_status(&Sig::TERM), Some(143));
        assert_eq!(signal_exit_status(&Sig::KILL), Some(137));
        assert_eq!(signal_exit_status(&Sig::INT), Some(130));
    }

    #[test]
    fn custom_signal_has_no_status() {
        assert_eq!(signal_exit_status(&Sig::Custom("XCPU".to_string())), None);
    }
}
