//! Cluster topology client

use async_trait::async_trait;
use helmi_core::ClusterNode;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};

use crate::error::Result;

/// Read access to the cluster's nodes
#[async_trait]
pub trait TopologyClient: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<ClusterNode>>;
}

/// Topology client backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeTopology {
    client: kube::Client,
}

impl KubeTopology {
    /// Connect using the default kubeconfig or in-cluster configuration
    pub async fn new() -> Result<Self> {
        let client = kube::Client::try_default().await?;
        Ok(Self { client })
    }

    /// Create with an existing Kubernetes client
    pub fn with_client(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TopologyClient for KubeTopology {
    async fn list_nodes(&self) -> Result<Vec<ClusterNode>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api.list(&ListParams::default()).await?;

        tracing::debug!(count = nodes.items.len(), "listed cluster nodes");
        Ok(nodes.items.iter().map(cluster_node).collect())
    }
}

/// Map a Kubernetes node to its name and addresses
///
/// Address types are matched case-insensitively. When a type appears more
/// than once the last entry wins.
pub fn cluster_node(node: &Node) -> ClusterNode {
    let mut cluster_node = ClusterNode::new(node.metadata.name.clone().unwrap_or_default());

    let addresses = node
        .status
        .as_ref()
        .and_then(|s| s.addresses.as_ref())
        .into_iter()
        .flatten();

    for address in addresses {
        let value = address.address.clone();
        match address.type_.to_ascii_lowercase().as_str() {
            "hostname" => cluster_node.hostname = value,
            "internalip" => cluster_node.internal_ip = value,
            "externalip" => cluster_node.external_ip = value,
            _ => {}
        }
    }

    cluster_node
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeAddress, NodeStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn address(type_: &str, address: &str) -> NodeAddress {
        NodeAddress {
            address: address.to_string(),
            type_: type_.to_string(),
        }
    }

    fn node(name: &str, addresses: Vec<NodeAddress>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                addresses: Some(addresses),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_cluster_node_addresses() {
        let node = node(
            "worker-1",
            vec![
                address("Hostname", "worker-1.local"),
                address("InternalIP", "10.0.0.5"),
                address("ExternalIP", "203.0.113.7"),
            ],
        );

        assert_eq!(
            cluster_node(&node),
            ClusterNode::new("worker-1")
                .with_hostname("worker-1.local")
                .with_internal_ip("10.0.0.5")
                .with_external_ip("203.0.113.7")
        );
    }

    #[test]
    fn test_cluster_node_case_insensitive_and_unknown_types() {
        let node = node(
            "worker-2",
            vec![
                address("internalip", "10.0.0.6"),
                address("InternalDNS", "worker-2.cluster.local"),
            ],
        );

        let mapped = cluster_node(&node);
        assert_eq!(mapped.internal_ip, "10.0.0.6");
        assert!(mapped.hostname.is_empty());
        assert!(mapped.external_ip.is_empty());
    }

    #[test]
    fn test_cluster_node_without_status() {
        let mapped = cluster_node(&Node::default());
        assert_eq!(mapped, ClusterNode::default());
    }
}
