//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Catalog not found: {path}")]
    CatalogNotFound { path: String },

    #[error("Invalid catalog: {message}")]
    InvalidCatalog { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No helm chart specified for service '{service_id}' and plan '{plan_id}'")]
    ChartNotSpecified { service_id: String, plan_id: String },

    #[error("Unknown service: {service_id}")]
    UnknownService { service_id: String },

    #[error("Unknown plan '{plan_id}' for service '{service_id}'")]
    UnknownPlan { service_id: String, plan_id: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
