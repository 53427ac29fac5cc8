//! Error types for helmi-kube

use helmi_core::CoreError;
use thiserror::Error;

/// Result type for helmi-kube operations
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors surfaced by the release orchestrator and its clients
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BrokerError {
    /// Neither the plan nor the service names a chart
    #[error("no helm chart specified for service '{service_id}' and plan '{plan_id}'")]
    ChartNotSpecified { service_id: String, plan_id: String },

    /// Service id is not in the catalog
    #[error("unknown service '{service_id}'")]
    UnknownService { service_id: String },

    /// Plan id is not offered by the service
    #[error("unknown plan '{plan_id}' for service '{service_id}'")]
    UnknownPlan { service_id: String, plan_id: String },

    /// Release does not exist
    #[error("release '{name}' not found")]
    NotFound { name: String },

    /// Release already exists
    #[error("release '{name}' already exists")]
    Conflict { name: String },

    /// An external command failed; output is kept verbatim
    #[error("{tool} failed: {output}")]
    ExternalToolFailure { tool: String, output: String },

    /// Catalog could not be loaded
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// IO error, e.g. the tool binary could not be spawned
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for BrokerError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::ChartNotSpecified {
                service_id,
                plan_id,
            } => BrokerError::ChartNotSpecified {
                service_id,
                plan_id,
            },
            CoreError::UnknownService { service_id } => BrokerError::UnknownService { service_id },
            CoreError::UnknownPlan {
                service_id,
                plan_id,
            } => BrokerError::UnknownPlan {
                service_id,
                plan_id,
            },
            other => BrokerError::Catalog(other.to_string()),
        }
    }
}

impl BrokerError {
    /// Build an external tool failure
    pub fn tool(tool: impl Into<String>, output: impl Into<String>) -> Self {
        BrokerError::ExternalToolFailure {
            tool: tool.into(),
            output: output.into(),
        }
    }

    /// Release is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, BrokerError::NotFound { .. })
    }

    /// Release already exists
    pub fn is_conflict(&self) -> bool {
        matches!(self, BrokerError::Conflict { .. })
    }

    /// Caused by the request rather than the system
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            BrokerError::ChartNotSpecified { .. }
                | BrokerError::UnknownService { .. }
                | BrokerError::UnknownPlan { .. }
        )
    }
}
