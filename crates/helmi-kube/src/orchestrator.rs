//! Release orchestration
//!
//! The [`Orchestrator`] maps broker operations on service instances onto
//! releases of the deployment tool. It owns no state of its own: the
//! deployment tool is the system of record and every call goes back to it.
//!
//! A failed call is never retried. Instead a second `exists` query decides
//! what the failure means:
//!
//! | operation     | release exists | release absent |
//! |---------------|----------------|----------------|
//! | `install`     | `Conflict`     | tool failure   |
//! | `delete`      | tool failure   | success        |
//! | `status`      | tool failure   | `NotFound`     |
//! | `credentials` | tool failure   | `NotFound`     |

use helmi_core::{
    Catalog, ColumnStatusParser, Credential, Environment, ProcessEnv, ResolutionContext,
    StatusParser, release_name, resolve_chart_values, resolve_user_credentials,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument, Span};

use crate::actions::InstallOptions;
use crate::deployment::DeploymentClient;
use crate::error::{BrokerError, Result};
use crate::release::InstanceStatus;
use crate::topology::TopologyClient;

/// Broker operations on top of the deployment and topology clients
pub struct Orchestrator {
    catalog: Arc<Catalog>,
    deployments: Arc<dyn DeploymentClient>,
    topology: Arc<dyn TopologyClient>,
    parser: Arc<dyn StatusParser>,
    env: Arc<dyn Environment + Send + Sync>,
    domain: Option<String>,
    span: Span,
}

impl Orchestrator {
    /// Create an orchestrator logging under `span`
    pub fn new(
        catalog: Arc<Catalog>,
        deployments: Arc<dyn DeploymentClient>,
        topology: Arc<dyn TopologyClient>,
        span: Span,
    ) -> Self {
        Self {
            catalog,
            deployments,
            topology,
            parser: Arc::new(ColumnStatusParser::default()),
            env: Arc::new(ProcessEnv),
            domain: None,
            span,
        }
    }

    /// Use a different status parser, e.g. one with another staleness timeout
    pub fn with_parser(mut self, parser: Arc<dyn StatusParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Source for `env` lookups in chart values
    pub fn with_environment(mut self, env: Arc<dyn Environment + Send + Sync>) -> Self {
        self.env = env;
        self
    }

    /// Address returned for `cluster/address` instead of a node address
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain.filter(|d| !d.is_empty());
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // ========== Install ==========

    /// Install a release for a new instance
    ///
    /// With `accepts_incomplete` the call returns once the tool accepted the
    /// release; otherwise it waits for all resources to be ready.
    /// Returns the release name.
    pub async fn install(
        &self,
        service_id: &str,
        plan_id: &str,
        instance_id: &str,
        accepts_incomplete: bool,
    ) -> Result<String> {
        let release = release_name(instance_id);
        let span = self.operation_span("install", instance_id, &release);

        async {
            let selection = self.catalog.select(service_id, plan_id)?;
            let chart = selection.chart()?;
            let values = resolve_chart_values(&selection, self.env.as_ref());

            let mut options = InstallOptions::new(&release, chart)
                .with_values(values)
                .with_wait(!accepts_incomplete);
            if let Some(version) = selection.chart_version() {
                options = options.with_version(version);
            }

            match self.deployments.install(&options).await {
                Ok(()) => {
                    tracing::info!(chart, version = ?options.version, "release installed");
                    Ok(release.clone())
                }
                Err(err) => {
                    tracing::error!(error = %err, "install failed");
                    match self.check_exists(&release).await {
                        Some(true) => {
                            tracing::info!("release already exists");
                            Err(BrokerError::Conflict {
                                name: release.clone(),
                            })
                        }
                        _ => Err(err),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    // ========== Delete ==========

    /// Delete an instance's release; deleting an absent release succeeds
    pub async fn delete(&self, instance_id: &str) -> Result<()> {
        let release = release_name(instance_id);
        let span = self.operation_span("delete", instance_id, &release);

        async {
            match self.deployments.delete(&release).await {
                Ok(()) => {
                    tracing::info!("release deleted");
                    Ok(())
                }
                Err(err) => match self.check_exists(&release).await {
                    Some(false) => {
                        tracing::info!("release already absent");
                        Ok(())
                    }
                    _ => {
                        tracing::error!(error = %err, "delete failed");
                        Err(err)
                    }
                },
            }
        }
        .instrument(span)
        .await
    }

    // ========== Status ==========

    /// Parsed status of an instance's release
    pub async fn status(&self, instance_id: &str) -> Result<InstanceStatus> {
        let release = release_name(instance_id);
        let span = self.operation_span("status", instance_id, &release);

        self.release_status(&release).instrument(span).await
    }

    async fn release_status(&self, release: &str) -> Result<InstanceStatus> {
        let raw = match self.deployments.status(release).await {
            Ok(raw) => raw,
            Err(err) => return Err(self.classify_missing(release, err).await),
        };

        let mut status = self.parser.parse(&raw);
        status.name = release.to_string();

        let instance = InstanceStatus::new(release, status);
        tracing::debug!(
            desired = instance.status.desired_nodes,
            available = instance.status.available_nodes,
            failed = instance.status.is_failed,
            state = %instance.state(),
            "release status"
        );
        Ok(instance)
    }

    // ========== Credentials ==========

    /// Resolve the bind credentials of an instance
    pub async fn credentials(
        &self,
        service_id: &str,
        plan_id: &str,
        instance_id: &str,
    ) -> Result<BTreeMap<String, Credential>> {
        let release = release_name(instance_id);
        let span = self.operation_span("credentials", instance_id, &release);

        async {
            let selection = self.catalog.select(service_id, plan_id)?;
            let instance = self.release_status(&release).await?;
            let nodes = self.topology.list_nodes().await?;

            let deployed_values = match self.deployments.get_values(&release).await {
                Ok(values) => values,
                Err(err) => return Err(self.classify_missing(&release, err).await),
            };

            let ctx = ResolutionContext {
                deployed_values: &deployed_values,
                nodes: &nodes,
                status: &instance.status,
                domain: self.domain.as_deref(),
            };
            let credentials = resolve_user_credentials(&selection, &ctx);

            tracing::debug!(
                keys = ?credentials.keys().collect::<Vec<_>>(),
                "credentials resolved"
            );
            Ok(credentials)
        }
        .instrument(span)
        .await
    }

    // ========== Exists ==========

    /// Whether the instance's release exists
    pub async fn exists(&self, instance_id: &str) -> Result<bool> {
        let release = release_name(instance_id);
        self.deployments
            .exists(&release)
            .instrument(self.operation_span("exists", instance_id, &release))
            .await
    }

    /// Unbind requires nothing from the release beyond its existence
    pub async fn unbind(&self, instance_id: &str) -> Result<()> {
        if self.exists(instance_id).await? {
            Ok(())
        } else {
            Err(BrokerError::NotFound {
                name: release_name(instance_id),
            })
        }
    }

    // ========== Helpers ==========

    fn operation_span(&self, operation: &'static str, instance_id: &str, release: &str) -> Span {
        tracing::info_span!(parent: &self.span, "operation", operation, instance_id, release)
    }

    /// Secondary existence check after a failed call
    ///
    /// `None` when the check itself failed.
    async fn check_exists(&self, release: &str) -> Option<bool> {
        match self.deployments.exists(release).await {
            Ok(exists) => Some(exists),
            Err(err) => {
                tracing::warn!(error = %err, "existence check failed");
                None
            }
        }
    }

    async fn classify_missing(&self, release: &str, err: BrokerError) -> BrokerError {
        match self.check_exists(release).await {
            Some(false) => BrokerError::NotFound {
                name: release.to_string(),
            },
            _ => {
                tracing::error!(error = %err, "release query failed");
                err
            }
        }
    }
}
