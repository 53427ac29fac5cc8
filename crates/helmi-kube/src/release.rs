//! Release state as seen by the broker

use helmi_core::DeploymentStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the last asynchronous operation on an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastOperationState {
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "in progress")]
    InProgress,
}

impl LastOperationState {
    /// Failure wins over availability
    pub fn from_status(status: &DeploymentStatus) -> Self {
        if status.is_failed {
            Self::Failed
        } else if status.is_available() {
            Self::Succeeded
        } else {
            Self::InProgress
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::InProgress => "in progress",
        }
    }
}

impl fmt::Display for LastOperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed status of an instance's release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    /// Release name derived from the instance id
    pub release: String,

    pub status: DeploymentStatus,
}

impl InstanceStatus {
    pub fn new(release: impl Into<String>, status: DeploymentStatus) -> Self {
        Self {
            release: release.into(),
            status,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status.is_available()
    }

    pub fn state(&self) -> LastOperationState {
        LastOperationState::from_status(&self.status)
    }
}
