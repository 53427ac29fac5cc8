//! Helmi - Open Service Broker API for Helm charts

use clap::Parser;
use helmi_broker::{Config, build_router, serve};
use helmi_core::{Catalog, ColumnStatusParser};
use helmi_kube::{HelmCli, KubeTopology, Orchestrator};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_panic_hook();

    let config = Config::parse();
    init_tracing(config.log_json);

    let catalog = Catalog::from_file(&config.catalog)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to load catalog {}", config.catalog.display()))?;
    tracing::info!(services = catalog.services.len(), "catalog loaded");

    let topology = KubeTopology::new()
        .await
        .into_diagnostic()
        .wrap_err("failed to create Kubernetes client")?;

    let helm = HelmCli::new(config.helm_bin.clone());
    tracing::info!(binary = helm.binary(), "using helm");

    let orchestrator = Orchestrator::new(
        Arc::new(catalog),
        Arc::new(helm),
        Arc::new(topology),
        tracing::info_span!("broker"),
    )
    .with_parser(Arc::new(ColumnStatusParser::new(config.staleness_timeout())))
    .with_domain(config.domain());

    let auth = config.auth();
    match &auth {
        Some(auth) => tracing::info!(username = auth.username(), "basic auth enabled"),
        None => tracing::warn!("basic auth disabled, set USERNAME and PASSWORD to enable it"),
    }

    let router = build_router(Arc::new(orchestrator), auth);
    serve(router, config.listen_addr()).await.into_diagnostic()
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
