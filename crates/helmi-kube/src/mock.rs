//! In-memory clients for testing
//!
//! These clients keep releases and nodes in memory, useful for unit tests
//! and local runs without a cluster or a `helm` binary.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use helmi_core::{ClusterNode, FlatValues, LAST_DEPLOYED_FORMAT};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::actions::InstallOptions;
use crate::deployment::DeploymentClient;
use crate::error::{BrokerError, Result};
use crate::topology::TopologyClient;

const TOOL: &str = "helm";

/// A release held by [`MockDeploymentClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRelease {
    pub name: String,
    pub chart: String,
    pub version: Option<String>,

    /// Values as passed at install time
    pub values: FlatValues,

    /// Whether the install asked to wait for readiness
    pub waited: bool,

    /// Text returned by `status`
    pub status_report: String,
}

impl MockRelease {
    /// A deployed release without resources
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chart: String::new(),
            version: None,
            values: FlatValues::new(),
            waited: false,
            status_report: deployed_report(Local::now()),
        }
    }

    pub fn with_values(mut self, values: FlatValues) -> Self {
        self.values = values;
        self
    }

    pub fn with_status_report(mut self, report: impl Into<String>) -> Self {
        self.status_report = report.into();
        self
    }

    fn from_install(options: &InstallOptions) -> Self {
        Self {
            name: options.name.clone(),
            chart: options.chart.clone(),
            version: options.version.clone(),
            values: options.values.clone().into_iter().collect(),
            waited: options.wait,
            status_report: deployed_report(Local::now()),
        }
    }
}

/// Minimal `helm status` report of a healthy release
pub fn deployed_report(last_deployed: DateTime<Local>) -> String {
    format!(
        "LAST DEPLOYED: {}\nNAMESPACE: default\nSTATUS: DEPLOYED\n",
        last_deployed.format(LAST_DEPLOYED_FORMAT)
    )
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub installs: usize,
    pub deletes: usize,
    pub statuses: usize,
    pub values: usize,
    pub exists: usize,
    pub node_lists: usize,
}

/// Operations that should fail with an injected tool error
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FailurePlan {
    pub install: bool,
    pub delete: bool,
    pub status: bool,
    pub values: bool,
    pub exists: bool,
}

/// In-memory deployment client for testing
#[derive(Clone, Default)]
pub struct MockDeploymentClient {
    /// Storage: release name -> release
    releases: Arc<RwLock<HashMap<String, MockRelease>>>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<OperationCounts>>,
    failures: Arc<RwLock<FailurePlan>>,
}

impl MockDeploymentClient {
    /// Create a new empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated releases
    pub fn with_releases(releases: impl IntoIterator<Item = MockRelease>) -> Self {
        let client = Self::new();
        {
            let mut store = write(&client.releases);
            for release in releases {
                store.insert(release.name.clone(), release);
            }
        }
        client
    }

    /// Make the given operations fail until changed
    pub fn fail(&self, plan: FailurePlan) {
        *write(&self.failures) = plan;
    }

    /// Replace the status report of an existing release
    pub fn set_status_report(&self, name: &str, report: impl Into<String>) {
        if let Some(release) = write(&self.releases).get_mut(name) {
            release.status_report = report.into();
        }
    }

    pub fn release(&self, name: &str) -> Option<MockRelease> {
        read(&self.releases).get(name).cloned()
    }

    pub fn release_count(&self) -> usize {
        read(&self.releases).len()
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        read(&self.operations).clone()
    }

    fn count(&self, op: impl FnOnce(&mut OperationCounts)) {
        op(&mut write(&self.operations));
    }

    fn failures(&self) -> FailurePlan {
        *read(&self.failures)
    }

    fn lookup(&self, name: &str) -> Result<MockRelease> {
        self.release(name).ok_or_else(|| not_found(name))
    }
}

#[async_trait]
impl DeploymentClient for MockDeploymentClient {
    async fn install(&self, options: &InstallOptions) -> Result<()> {
        self.count(|ops| ops.installs += 1);
        if self.failures().install {
            return Err(injected("install"));
        }

        let mut store = write(&self.releases);
        if store.contains_key(&options.name) {
            return Err(BrokerError::tool(
                TOOL,
                format!("Error: a release named {} already exists.", options.name),
            ));
        }
        store.insert(options.name.clone(), MockRelease::from_install(options));
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.count(|ops| ops.deletes += 1);
        if self.failures().delete {
            return Err(injected("delete"));
        }

        write(&self.releases)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    async fn status(&self, name: &str) -> Result<String> {
        self.count(|ops| ops.statuses += 1);
        if self.failures().status {
            return Err(injected("status"));
        }

        self.lookup(name).map(|release| release.status_report)
    }

    async fn get_values(&self, name: &str) -> Result<FlatValues> {
        self.count(|ops| ops.values += 1);
        if self.failures().values {
            return Err(injected("get values"));
        }

        self.lookup(name).map(|release| release.values)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        self.count(|ops| ops.exists += 1);
        if self.failures().exists {
            return Err(injected("status"));
        }

        Ok(read(&self.releases).contains_key(name))
    }
}

/// In-memory topology client for testing
#[derive(Clone, Default)]
pub struct MockTopologyClient {
    nodes: Arc<RwLock<Vec<ClusterNode>>>,
    operations: Arc<RwLock<OperationCounts>>,
    fail: Arc<RwLock<bool>>,
}

impl MockTopologyClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = ClusterNode>) -> Self {
        let client = Self::new();
        write(&client.nodes).extend(nodes);
        client
    }

    /// Make `list_nodes` fail until changed
    pub fn fail(&self, fail: bool) {
        *write(&self.fail) = fail;
    }

    pub fn operation_counts(&self) -> OperationCounts {
        read(&self.operations).clone()
    }
}

#[async_trait]
impl TopologyClient for MockTopologyClient {
    async fn list_nodes(&self) -> Result<Vec<ClusterNode>> {
        write(&self.operations).node_lists += 1;
        if *read(&self.fail) {
            return Err(BrokerError::tool("kubectl", "injected failure: get nodes"));
        }
        Ok(read(&self.nodes).clone())
    }
}

fn not_found(name: &str) -> BrokerError {
    BrokerError::tool(TOOL, format!("Error: release: \"{name}\" not found"))
}

fn injected(operation: &str) -> BrokerError {
    BrokerError::tool(TOOL, format!("injected failure: {operation}"))
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmi_core::{DEFAULT_STALENESS_TIMEOUT, parse_status};
    use std::collections::BTreeMap;

    fn options(name: &str) -> InstallOptions {
        InstallOptions::new(name, "stable/mariadb")
            .with_values(BTreeMap::from([("user".to_string(), "admin".to_string())]))
    }

    #[tokio::test]
    async fn test_mock_install_and_get_values() {
        let client = MockDeploymentClient::new();

        client.install(&options("helmiabc")).await.unwrap();

        let values = client.get_values("helmiabc").await.unwrap();
        assert_eq!(values.get("user"), Some("admin"));
        assert!(client.exists("helmiabc").await.unwrap());

        let counts = client.operation_counts();
        assert_eq!(counts.installs, 1);
        assert_eq!(counts.values, 1);
        assert_eq!(counts.exists, 1);
    }

    #[tokio::test]
    async fn test_mock_install_duplicate_fails() {
        let client = MockDeploymentClient::new();

        client.install(&options("helmiabc")).await.unwrap();
        let result = client.install(&options("helmiabc")).await;

        assert!(matches!(result, Err(BrokerError::ExternalToolFailure { .. })));
        assert_eq!(client.release_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_delete() {
        let client = MockDeploymentClient::with_releases([MockRelease::new("helmiabc")]);

        client.delete("helmiabc").await.unwrap();
        assert!(!client.exists("helmiabc").await.unwrap());

        let again = client.delete("helmiabc").await;
        assert!(matches!(again, Err(BrokerError::ExternalToolFailure { .. })));
    }

    #[tokio::test]
    async fn test_mock_status_report_parses_as_deployed() {
        let client = MockDeploymentClient::with_releases([MockRelease::new("helmiabc")]);

        let raw = client.status("helmiabc").await.unwrap();
        let status = parse_status(&raw, DEFAULT_STALENESS_TIMEOUT);

        assert!(status.is_deployed);
        assert!(!status.is_failed);
        assert_eq!(status.namespace, "default");
        assert!(status.last_deployed_at.is_some());
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let client = MockDeploymentClient::with_releases([MockRelease::new("helmiabc")]);
        client.fail(FailurePlan {
            status: true,
            ..Default::default()
        });

        assert!(client.status("helmiabc").await.is_err());
        assert!(client.exists("helmiabc").await.unwrap());

        client.fail(FailurePlan::default());
        assert!(client.status("helmiabc").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_topology() {
        let topology = MockTopologyClient::with_nodes([ClusterNode::new("n1")]);

        assert_eq!(topology.list_nodes().await.unwrap().len(), 1);

        topology.fail(true);
        assert!(topology.list_nodes().await.is_err());
        assert_eq!(topology.operation_counts().node_lists, 2);
    }
}
