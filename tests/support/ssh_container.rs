// ABOUTME: SSH server container for integration tests of the russh transport.
// ABOUTME: Uses bollard to run one shared openssh-server container per test binary.

use bollard::Docker;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, RemoveContainerOptions, StopContainerOptions,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tether::gateway::RemoteGateway;
use tether::ssh::{Credentials, FsKeySource, RusshTransport, TransportConfig};
use tether::types::HostSpec;

const IMAGE: &str = "lscr.io/linuxserver/openssh-server:latest";
const SSH_PORT: u16 = 2222;
pub const TEST_USER: &str = "testuser";
pub const TEST_PASSWORD: &str = "tether-test-password";

static CONTAINER_ID: OnceLock<String> = OnceLock::new();

#[ctor::dtor]
fn cleanup_on_exit() {
    let Some(id) = CONTAINER_ID.get() else {
        return;
    };
    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return;
    };
    rt.block_on(async {
        if let Ok(docker) = Docker::connect_with_local_defaults() {
            let _ = docker
                .stop_container(id, None::<StopContainerOptions>)
                .await;
            let _ = docker
                .remove_container(
                    id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;
        }
    });
}

static SHARED_CONTAINER: tokio::sync::OnceCell<SshContainer> = tokio::sync::OnceCell::const_new();

/// Get the shared SSH container, starting it on first use.
pub async fn shared_container() -> &'static SshContainer {
    SHARED_CONTAINER
        .get_or_init(|| async {
            SshContainer::start()
                .await
                .expect("failed to start SSH container")
        })
        .await
}

/// Running SSH server reachable on localhost.
pub struct SshContainer {
    port: u16,
}

impl SshContainer {
    async fn start() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let docker = Docker::connect_with_local_defaults()?;
        let public_key = std::fs::read_to_string(super::fixture("id_ed25519.pub"))?;

        let mut pull = docker.create_image(
            Some(CreateImageOptions {
                from_image: Some(IMAGE.to_string()),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(progress) = pull.next().await {
            progress?;
        }

        let port = free_port().await?;

        let env = vec![
            "PUID=1000".to_string(),
            "PGID=1000".to_string(),
            format!("USER_NAME={}", TEST_USER),
            format!("PUBLIC_KEY={}", public_key.trim()),
            "PASSWORD_ACCESS=true".to_string(),
            format!("USER_PASSWORD={}", TEST_PASSWORD),
        ];

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            format!("{}/tcp", SSH_PORT),
            Some(vec![bollard::models::PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some(port.to_string()),
            }]),
        );

        let container = docker
            .create_container(
                Some(CreateContainerOptions {
                    name: Some(format!("tether-ssh-test-{}", std::process::id())),
                    ..Default::default()
                }),
                ContainerCreateBody {
                    image: Some(IMAGE.to_string()),
                    env: Some(env),
                    host_config: Some(bollard::models::HostConfig {
                        port_bindings: Some(port_bindings),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await?;

        let _ = CONTAINER_ID.set(container.id.clone());

        docker
            .start_container(
                &container.id,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await?;

        wait_for_banner(port).await?;

        Ok(Self { port })
    }

    pub fn host(&self) -> HostSpec {
        HostSpec::parse(&format!("127.0.0.1:{}", self.port)).expect("localhost spec parses")
    }

    /// Transport that trusts the container's key, recorded in a private
    /// known_hosts file so the user's own file is left alone.
    pub fn transport(&self) -> RusshTransport {
        let known_hosts: PathBuf =
            std::env::temp_dir().join(format!("tether-known-hosts-{}", std::process::id()));
        RusshTransport::new(
            TransportConfig::default()
                .trust_on_first_use(true)
                .known_hosts_path(known_hosts),
        )
    }

    /// Gateway logging in with the fixture key.
    pub fn key_gateway(&self) -> RemoteGateway<RusshTransport> {
        self.gateway(Credentials::key_file(super::fixture("id_ed25519")))
    }

    pub fn gateway(&self, credentials: Credentials) -> RemoteGateway<RusshTransport> {
        RemoteGateway::for_host(
            self.host(),
            credentials,
            FsKeySource,
            self.transport(),
            Some(Duration::from_secs(10)),
        )
    }
}

async fn free_port() -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

async fn wait_for_banner(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::io::AsyncReadExt;

    let addr = format!("127.0.0.1:{}", port);
    for _ in 0..60 {
        if let Ok(mut stream) = tokio::net::TcpStream::connect(&addr).await {
            let mut buf = [0u8; 32];
            if let Ok(Ok(n)) = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await
                && n > 0
                && buf[..n].starts_with(b"SSH-")
            {
                // Key setup in the container finishes shortly after sshd starts
                tokio::time::sleep(Duration::from_millis(500)).await;
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Err("SSH container did not become ready in time".into())
}
