//! Helmi Kube - Helm and Kubernetes integration for Helmi
//!
//! This crate provides:
//! - **Deployment Client**: Install, delete and query releases through the `helm` CLI
//! - **Topology Client**: Read cluster nodes and their addresses from the Kubernetes API
//! - **Release Orchestration**: Broker operations with failure classification
//! - **Mock Clients**: In-memory clients for tests and local runs

pub mod actions;
pub mod deployment;
pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod release;
pub mod topology;

pub use actions::InstallOptions;
pub use deployment::{DeploymentClient, HelmCli};
pub use error::{BrokerError, Result};
pub use mock::{
    FailurePlan, MockDeploymentClient, MockRelease, MockTopologyClient, OperationCounts,
};
pub use orchestrator::Orchestrator;
pub use release::{InstanceStatus, LastOperationState};
pub use topology::{KubeTopology, TopologyClient};
