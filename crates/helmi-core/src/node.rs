//! Cluster node descriptors

use serde::{Deserialize, Serialize};

/// A cluster node as reported by the topology client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNode {
    /// Node name
    pub name: String,

    /// `Hostname` address, empty if the node reports none
    #[serde(default)]
    pub hostname: String,

    /// `InternalIP` address
    #[serde(default)]
    pub internal_ip: String,

    /// `ExternalIP` address
    #[serde(default)]
    pub external_ip: String,
}

impl ClusterNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_internal_ip(mut self, ip: impl Into<String>) -> Self {
        self.internal_ip = ip.into();
        self
    }

    pub fn with_external_ip(mut self, ip: impl Into<String>) -> Self {
        self.external_ip = ip.into();
        self
    }
}

/// Address clients should connect to: first external IP, else first internal IP
pub fn preferred_address(nodes: &[ClusterNode]) -> Option<&str> {
    nodes
        .iter()
        .map(|n| n.external_ip.as_str())
        .find(|ip| !ip.is_empty())
        .or_else(|| {
            nodes
                .iter()
                .map(|n| n.internal_ip.as_str())
                .find(|ip| !ip.is_empty())
        })
}

/// First non-empty hostname
pub fn first_hostname(nodes: &[ClusterNode]) -> Option<&str> {
    nodes
        .iter()
        .map(|n| n.hostname.as_str())
        .find(|h| !h.is_empty())
}
