//! Broker configuration
//!
//! Read once at startup from flags or the environment.

use clap::Parser;
use helmi_core::DEFAULT_STALENESS_TIMEOUT;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::auth::BasicAuth;

#[derive(Parser, Debug, Clone)]
#[command(name = "helmi")]
#[command(version)]
#[command(about = "Open Service Broker API for Helm charts", long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Catalog of services and plans
    #[arg(long, env = "CATALOG", default_value = "./catalog.yaml")]
    pub catalog: PathBuf,

    /// Time a release may stay below its desired size before it counts as failed
    #[arg(long, env = "TIMEOUT", default_value = "30m")]
    pub timeout: humantime::Duration,

    /// External domain returned as `cluster` address instead of node addresses
    #[arg(long, env = "DOMAIN")]
    pub domain: Option<String>,

    /// Basic auth username
    #[arg(long, env = "USERNAME")]
    pub username: Option<String>,

    /// Basic auth password
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Helm binary
    #[arg(long, env = "HELM_BIN", default_value = "helm")]
    pub helm_bin: String,

    /// Log as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Credentials to require, if both username and password are set
    pub fn auth(&self) -> Option<BasicAuth> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() => {
                Some(BasicAuth::new(username, password))
            }
            _ => None,
        }
    }

    pub fn staleness_timeout(&self) -> chrono::Duration {
        chrono::Duration::from_std(*self.timeout).unwrap_or(DEFAULT_STALENESS_TIMEOUT)
    }

    /// Domain override, ignoring an empty value
    pub fn domain(&self) -> Option<String> {
        self.domain.clone().filter(|d| !d.is_empty())
    }
}
