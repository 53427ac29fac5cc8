//! Helmi - Open Service Broker API for Helm charts
//!
//! Provides:
//! - Configuration from flags and environment
//! - Basic authentication
//! - OSB v2 endpoints for catalog, provisioning, binding and last operation

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use auth::BasicAuth;
pub use config::Config;
pub use error::{ApiError, Result};
pub use handlers::AppState;
pub use router::build_router;
pub use server::serve;
