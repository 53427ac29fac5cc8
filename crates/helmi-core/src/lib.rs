//! Helmi Core - Core types for the Helm service broker
//!
//! This crate provides the pieces of Helmi that do not talk to anything:
//! - `Catalog`: Services and plans offered by the broker
//! - `DeploymentStatus`: Structured view of a `helm status` report
//! - `lookup`: The `{{ lookup('kind', 'path') }}` placeholder grammar
//! - `credentials`: Chart value and bind credential resolution
//! - `SecretGenerator`: Per-call generation of usernames and passwords

pub mod catalog;
pub mod credentials;
pub mod error;
pub mod lookup;
pub mod naming;
pub mod node;
pub mod secrets;
pub mod status;
pub mod values;

pub use catalog::{Catalog, CredentialTemplate, Plan, Service, ServicePlan};
pub use credentials::{
    Credential, Environment, ProcessEnv, ResolutionContext, resolve_chart_values,
    resolve_user_credentials,
};
pub use error::{CoreError, Result};
pub use lookup::{LookupKind, LookupPlaceholder, Segment};
pub use naming::{RELEASE_PREFIX, release_name};
pub use node::ClusterNode;
pub use secrets::SecretGenerator;
pub use status::{
    ColumnStatusParser, DEFAULT_STALENESS_TIMEOUT, DeploymentStatus, LAST_DEPLOYED_FORMAT,
    StatusParser, parse_status,
};
pub use values::FlatValues;
