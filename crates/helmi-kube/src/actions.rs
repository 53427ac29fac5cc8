//! Options for the install operation

use std::collections::BTreeMap;

/// What to install and how
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Release name
    pub name: String,

    /// Chart reference, e.g. `stable/mariadb`
    pub chart: String,

    /// Chart version; latest when unset
    pub version: Option<String>,

    /// Values passed with `--set`
    pub values: BTreeMap<String, String>,

    /// Block until all resources are ready
    pub wait: bool,
}

impl InstallOptions {
    /// Create install options for a release of `chart`
    pub fn new(name: impl Into<String>, chart: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chart: chart.into(),
            ..Default::default()
        }
    }

    /// Pin the chart version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_values(mut self, values: BTreeMap<String, String>) -> Self {
        self.values = values;
        self
    }

    /// Wait for resources to be ready before returning
    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }
}
