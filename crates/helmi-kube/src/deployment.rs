//! Deployment client
//!
//! [`DeploymentClient`] is everything the broker needs from the deployment
//! tool. [`HelmCli`] implements it by running the `helm` v2 binary.

use async_trait::async_trait;
use helmi_core::FlatValues;
use tokio::process::Command;

use crate::actions::InstallOptions;
use crate::error::{BrokerError, Result};

/// Operations on releases of the deployment tool
#[async_trait]
pub trait DeploymentClient: Send + Sync {
    /// Install a new release
    async fn install(&self, options: &InstallOptions) -> Result<()>;

    /// Delete a release and purge its history
    async fn delete(&self, name: &str) -> Result<()>;

    /// Raw status report of a release
    async fn status(&self, name: &str) -> Result<String>;

    /// Values the release was deployed with, flattened
    async fn get_values(&self, name: &str) -> Result<FlatValues>;

    /// Whether the release exists
    async fn exists(&self, name: &str) -> Result<bool>;
}

/// Deployment client backed by the `helm` command line
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: String,
}

impl HelmCli {
    pub const DEFAULT_BINARY: &'static str = "helm";

    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run helm and return its combined output
    ///
    /// A non-zero exit becomes an [`BrokerError::ExternalToolFailure`].
    async fn run(&self, args: &[String]) -> Result<String> {
        let output = self.output(args).await?;
        if output.success {
            Ok(output.text)
        } else {
            Err(BrokerError::tool(&self.binary, output.text))
        }
    }

    async fn output(&self, args: &[String]) -> Result<ToolOutput> {
        tracing::debug!(binary = %self.binary, args = ?args, "running deployment tool");

        let output = Command::new(&self.binary).args(args).output().await?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ToolOutput {
            success: output.status.success(),
            text,
        })
    }
}

impl Default for HelmCli {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BINARY)
    }
}

struct ToolOutput {
    success: bool,
    text: String,
}

#[async_trait]
impl DeploymentClient for HelmCli {
    async fn install(&self, options: &InstallOptions) -> Result<()> {
        self.run(&install_args(options)).await.map(|_| ())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.run(&delete_args(name)).await.map(|_| ())
    }

    async fn status(&self, name: &str) -> Result<String> {
        self.run(&status_args(name)).await
    }

    async fn get_values(&self, name: &str) -> Result<FlatValues> {
        let output = self.run(&values_args(name)).await?;
        FlatValues::from_yaml(&output).map_err(|e| BrokerError::tool(&self.binary, e.to_string()))
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let output = self.output(&status_args(name)).await?;
        exists_from_output(&self.binary, output.success, &output.text)
    }
}

/// `install <chart> --name <name> [--version v] [--wait] [--set k=v]...`
pub fn install_args(options: &InstallOptions) -> Vec<String> {
    let mut args = vec![
        "install".to_string(),
        options.chart.clone(),
        "--name".to_string(),
        options.name.clone(),
    ];

    if let Some(version) = options.version.as_deref().filter(|v| !v.is_empty()) {
        args.push("--version".to_string());
        args.push(version.to_string());
    }
    if options.wait {
        args.push("--wait".to_string());
    }
    for (key, value) in &options.values {
        args.push("--set".to_string());
        args.push(format!("{key}={}", escape_set_value(value)));
    }

    args
}

pub fn delete_args(name: &str) -> Vec<String> {
    vec!["delete".to_string(), name.to_string(), "--purge".to_string()]
}

pub fn status_args(name: &str) -> Vec<String> {
    vec!["status".to_string(), name.to_string()]
}

pub fn values_args(name: &str) -> Vec<String> {
    vec![
        "get".to_string(),
        "values".to_string(),
        name.to_string(),
        "--all".to_string(),
    ]
}

/// `--set` splits on commas; keep them inside the value
pub fn escape_set_value(value: &str) -> String {
    value.replace(',', "\\,")
}

/// Interpret the result of `helm status` as an existence check
pub fn exists_from_output(tool: &str, success: bool, output: &str) -> Result<bool> {
    if success {
        return Ok(!output.trim().is_empty());
    }
    if output.to_ascii_lowercase().contains("not found") {
        return Ok(false);
    }
    Err(BrokerError::tool(tool, output))
}
