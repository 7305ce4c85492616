// ABOUTME: Exec command implementation.
// ABOUTME: Runs one shell command on each configured host and streams its output.

use futures::future::join_all;
use tether::config::{Config, HostConfig};
use tether::error::{Error, Result};
use tether::gateway::{Gateway, RemoteGateway};
use tether::output::Output;
use tether::ssh::{FsKeySource, RusshTransport};

/// Execute a command on every host in the configuration.
pub async fn exec_command(
    config: Config,
    command: Vec<String>,
    parallel: bool,
    output: Output,
) -> Result<()> {
    let command = command.join(" ");
    let total = config.hosts.len();

    if config.trust_first_connection {
        output.warning(
            "trust_first_connection is enabled: unknown host keys will be accepted and saved",
        );
    }

    let outcomes = if parallel {
        join_all(
            config
                .hosts
                .iter()
                .map(|host| exec_on_host(&config, host, &command, &output)),
        )
        .await
    } else {
        let mut outcomes = Vec::with_capacity(total);
        for host in config.hosts.iter() {
            outcomes.push(exec_on_host(&config, host, &command, &output).await);
        }
        outcomes
    };

    let failed = outcomes.iter().filter(|ok| !**ok).count();
    if failed > 0 {
        return Err(Error::CommandFailed { failed, total });
    }
    Ok(())
}

/// Run on one host, reporting the outcome. Returns whether it exited 0.
async fn exec_on_host(config: &Config, host: &HostConfig, command: &str, output: &Output) -> bool {
    match run_on_host(config, host, command, output).await {
        Ok((label, status)) => {
            output.exit(&label, status);
            status == Some(0)
        }
        Err(e) => {
            output.error(Some(&host.host), &e.to_string());
            false
        }
    }
}

async fn run_on_host(
    config: &Config,
    host: &HostConfig,
    command: &str,
    output: &Output,
) -> Result<(String, Option<u32>)> {
    let spec = host
        .spec()
        .map_err(|e| Error::InvalidConfig(format!("host '{}': {}", host.host, e)))?;
    let label = spec.to_string();
    let user = config.user_for(host);
    let credentials = config.credentials_for(host)?;

    let mut gateway = RemoteGateway::for_host(
        spec,
        credentials,
        FsKeySource,
        RusshTransport::new(config.transport_config()),
        config.timeout(),
    );

    output.progress(&format!("  → Connecting to {}@{}...", user, label));
    gateway.connect(&user).await?;

    let result = stream_command(&mut gateway, command, &label, output).await;

    // Disconnect failures are logged by the gateway and never fail the run
    gateway.disconnect().await;

    result.map(|status| (label, status))
}

async fn stream_command(
    gateway: &mut impl Gateway,
    command: &str,
    label: &str,
    output: &Output,
) -> Result<Option<u32>> {
    gateway.run(command).await?;
    while let Some(chunk) = gateway.next_line().await? {
        output.chunk(label, &chunk);
    }
    Ok(gateway.status()?)
}
