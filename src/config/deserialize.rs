// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Accepts host lists mixing "[user@]host[:port]" strings and detailed entries.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::HostConfig;

pub fn deserialize_hosts<'de, D>(deserializer: D) -> Result<NonEmpty<HostConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<HostEntry> = Vec::deserialize(deserializer)?;
    collect_hosts::<D::Error>(values)?
        .ok_or_else(|| serde::de::Error::custom("at least one host is required"))
}

pub fn deserialize_hosts_option<'de, D>(
    deserializer: D,
) -> Result<Option<NonEmpty<HostConfig>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<Vec<HostEntry>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(values) => collect_hosts::<D::Error>(values)?
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("destination hosts list cannot be empty")),
    }
}

fn collect_hosts<E: serde::de::Error>(
    values: Vec<HostEntry>,
) -> Result<Option<NonEmpty<HostConfig>>, E> {
    let hosts = values
        .into_iter()
        .map(HostEntry::into_host_config)
        .collect::<Result<Vec<_>, _>>()
        .map_err(E::custom)?;
    Ok(NonEmpty::from_vec(hosts))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostEntry {
    Simple(String),
    Detailed(HostConfig),
}

impl HostEntry {
    fn into_host_config(self) -> Result<HostConfig, String> {
        match self {
            HostEntry::Simple(s) => HostConfig::parse(&s),
            HostEntry::Detailed(c) => c.validate().map(|_| c),
        }
    }
}
