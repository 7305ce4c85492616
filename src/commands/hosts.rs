// ABOUTME: Hosts command implementation.
// ABOUTME: Lists resolved hosts with their login user and authentication method.

use tether::config::Config;
use tether::error::{Error, Result};
use tether::output::Output;

pub fn list_hosts(config: &Config, output: &Output) -> Result<()> {
    output.progress(&format!("{} host(s)", config.hosts.len()));

    for host in config.hosts.iter() {
        let spec = host
            .spec()
            .map_err(|e| Error::InvalidConfig(format!("host '{}': {}", host.host, e)))?;
        let method = host.auth.as_ref().unwrap_or(&config.auth).method();
        println!("{}\t{}\t{}", spec, config.user_for(host), method);
    }

    Ok(())
}
