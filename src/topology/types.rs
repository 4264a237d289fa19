use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_PARTITIONS: u32 = 4;

/// Logical name of a node in the mesh ("B", "C", "D", "E", ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeName(pub String);

impl NodeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the `edges` list.
///
/// Both `{id, address}` and `{id, ip, port}` forms are accepted; `address` wins
/// when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl EdgeEntry {
    /// Returns the `host:port` this edge points at.
    pub fn resolved_address(&self) -> Result<String, ConfigurationError> {
        let address = match (&self.address, &self.ip, self.port) {
            (Some(address), _, _) => address.trim().to_string(),
            (None, Some(ip), Some(port)) => format!("{}:{}", ip.trim(), port),
            _ => return Err(ConfigurationError::IncompleteEdge(self.id.clone())),
        };

        let valid = match address.rsplit_once(':') {
            Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
            None => false,
        };
        if !valid {
            return Err(ConfigurationError::InvalidAddress {
                id: self.id.clone(),
                address,
            });
        }
        Ok(address)
    }
}

/// The static topology document every node loads at startup.
///
/// `owners` is the one partition-assignment map shared by the whole mesh: each node
/// reads the same file, so all nodes agree on who owns which partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyDocument {
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector: Option<String>,
    /// When set, partitions missing from `owners` are routed to the collector
    /// instead of being reported as unroutable.
    #[serde(default)]
    pub residual_to_collector: bool,
    #[serde(default)]
    pub owners: BTreeMap<String, Vec<u32>>,
    pub edges: Vec<EdgeEntry>,
}

fn default_partitions() -> u32 {
    DEFAULT_PARTITIONS
}
