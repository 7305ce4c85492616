// ABOUTME: Host specification parsing for remote connections.
// ABOUTME: Resolves "host", "host:port", "[ipv6]" and "[ipv6]:port" into address and port.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use thiserror::Error;

/// Port used when the host string does not carry one.
pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostSpecError {
    #[error("host cannot be empty")]
    Empty,

    #[error("missing address before port in '{0}'")]
    MissingAddress(String),

    #[error("invalid port '{port}' in '{input}'")]
    InvalidPort { input: String, port: String },
}

/// A resolved remote address and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostSpec {
    address: String,
    port: u16,
}

impl HostSpec {
    /// Parse a raw host string.
    ///
    /// Brackets around the whole string are stripped before the IP check, so
    /// `[2001:db8::1]:2222` splits on its last colon while a bare
    /// `2001:db8::1` is kept whole on the default port. Addresses produced by
    /// a split that turn out to be IPv6 literals are re-bracketed.
    pub fn parse(raw: &str) -> Result<Self, HostSpecError> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(HostSpecError::Empty);
        }

        let stripped = strip_brackets(input);

        if stripped.parse::<IpAddr>().is_ok() {
            return Ok(Self {
                address: input.to_string(),
                port: DEFAULT_SSH_PORT,
            });
        }

        let Some((address, port)) = stripped.rsplit_once(':') else {
            return Ok(Self {
                address: stripped.to_string(),
                port: DEFAULT_SSH_PORT,
            });
        };

        let address = strip_brackets(address);
        if address.is_empty() {
            return Err(HostSpecError::MissingAddress(input.to_string()));
        }

        let port = match port.parse::<u16>() {
            Ok(p) if p > 0 => p,
            _ => {
                return Err(HostSpecError::InvalidPort {
                    input: input.to_string(),
                    port: port.to_string(),
                });
            }
        };

        let address = if address.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]", address)
        } else {
            address.to_string()
        };

        Ok(Self { address, port })
    }

    /// Build a spec from an already separated address and port.
    pub fn with_port(raw: &str, port: u16) -> Result<Self, HostSpecError> {
        if port == 0 {
            return Err(HostSpecError::InvalidPort {
                input: raw.to_string(),
                port: port.to_string(),
            });
        }
        let mut spec = Self::parse(raw)?;
        spec.port = port;
        Ok(spec)
    }

    /// Address as resolved, bracketed when it came from an `[ipv6]:port` form.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address without IPv6 brackets, suitable for socket resolution.
    pub fn connect_host(&self) -> &str {
        strip_brackets(&self.address)
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.parse::<Ipv6Addr>().is_ok() {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

impl std::str::FromStr for HostSpec {
    type Err = HostSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn strip_brackets(s: &str) -> &str {
    let s = s.strip_prefix('[').unwrap_or(s);
    s.strip_suffix(']').unwrap_or(s)
}
