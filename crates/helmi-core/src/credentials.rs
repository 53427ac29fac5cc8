//! Credential and chart value resolution
//!
//! The same placeholder grammar is resolved twice in an instance's life:
//!
//! - **Install**: [`resolve_chart_values`] turns `chart-values` templates into
//!   `--set` values. `username`/`password` lookups generate fresh tokens and
//!   `env` lookups read the environment.
//! - **Bind**: [`resolve_user_credentials`] turns `user-credentials` templates
//!   into the credentials handed to the application. `value`, `username` and
//!   `password` lookups read what was actually deployed, `cluster` lookups
//!   read node topology and node ports.
//!
//! Keys that resolve to an empty string are left out of the result.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::catalog::{CredentialTemplate, ServicePlan};
use crate::lookup::{LookupKind, LookupPlaceholder, expand};
use crate::node::{self, ClusterNode};
use crate::secrets::SecretGenerator;
use crate::status::DeploymentStatus;
use crate::values::FlatValues;

/// Source for `env` lookups
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl Environment for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// A resolved credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Credential {
    Single(String),
    List(Vec<String>),
}

impl Credential {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::List(_) => None,
        }
    }
}

/// Everything bind-time lookups resolve against
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    /// Flattened values of the deployed release
    pub deployed_values: &'a FlatValues,

    pub nodes: &'a [ClusterNode],

    /// Parsed status of the deployed release, for node ports
    pub status: &'a DeploymentStatus,

    /// Overrides node addresses for `cluster/address`
    pub domain: Option<&'a str>,
}

/// Resolve chart value templates for an install
///
/// Generated usernames and passwords are shared between keys using the same
/// lookup within this call only.
pub fn resolve_chart_values(
    selection: &ServicePlan<'_>,
    env: &dyn Environment,
) -> BTreeMap<String, String> {
    let mut secrets = SecretGenerator::new();
    let mut values = BTreeMap::new();

    for (key, template) in selection.chart_values() {
        let value = expand(&template, |lookup| match lookup.kind {
            LookupKind::Username | LookupKind::Password => {
                secrets.get_or_generate(&secret_key(lookup))
            }
            LookupKind::Env => env.var(&lookup.path).unwrap_or_default(),
            LookupKind::Value | LookupKind::Cluster => String::new(),
        });

        if !value.is_empty() {
            values.insert(key, value);
        }
    }

    values
}

/// Resolve credential templates for a bind
pub fn resolve_user_credentials(
    selection: &ServicePlan<'_>,
    ctx: &ResolutionContext<'_>,
) -> BTreeMap<String, Credential> {
    let resolve = |template: &str| expand(template, |lookup| resolve_bound(lookup, ctx));
    let mut credentials = BTreeMap::new();

    for (key, template) in selection.user_credentials() {
        let credential = match template {
            CredentialTemplate::Single(template) => {
                Some(resolve(&template)).filter(|v| !v.is_empty()).map(Credential::Single)
            }
            CredentialTemplate::List(templates) => {
                let values: Vec<String> = templates
                    .iter()
                    .map(|t| resolve(t))
                    .filter(|v| !v.is_empty())
                    .collect();
                (!values.is_empty()).then_some(Credential::List(values))
            }
        };

        if let Some(credential) = credential {
            credentials.insert(key, credential);
        }
    }

    credentials
}

fn secret_key(lookup: &LookupPlaceholder) -> String {
    format!("{}:{}", lookup.kind, lookup.path)
}

fn resolve_bound(lookup: &LookupPlaceholder, ctx: &ResolutionContext<'_>) -> String {
    match lookup.kind {
        LookupKind::Value | LookupKind::Username | LookupKind::Password => ctx
            .deployed_values
            .get(&lookup.path)
            .unwrap_or_default()
            .to_string(),
        LookupKind::Cluster => resolve_cluster(&lookup.path, ctx),
        LookupKind::Env => String::new(),
    }
}

fn resolve_cluster(path: &str, ctx: &ResolutionContext<'_>) -> String {
    let path = path.to_ascii_lowercase();

    if path == "port" {
        return port_or_zero(ctx.status.first_node_port());
    }
    if let Some(cluster_port) = path.strip_prefix("port:") {
        let node_port = cluster_port
            .parse::<u16>()
            .ok()
            .and_then(|p| ctx.status.node_port(p));
        return port_or_zero(node_port);
    }

    let found = match path.as_str() {
        "address" => ctx
            .domain
            .filter(|d| !d.is_empty())
            .or_else(|| node::preferred_address(ctx.nodes)),
        "hostname" => node::first_hostname(ctx.nodes),
        _ => None,
    };
    found.unwrap_or_default().to_string()
}

fn port_or_zero(port: Option<u16>) -> String {
    port.unwrap_or(0).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Plan, Service};

    fn service() -> Service {
        Service {
            id: "12345".to_string(),
            name: "test_service".to_string(),
            chart: "service_chart".to_string(),
            chart_values: BTreeMap::from([
                ("foo".to_string(), "bar".to_string()),
                (
                    "password".to_string(),
                    "{{ lookup('password', 'password') }}".to_string(),
                ),
            ]),
            user_credentials: BTreeMap::from([
                ("key".to_string(), "{{lookup('value','foo')}}".into()),
                ("hostname".to_string(), "{{lookup('cluster','address')}}".into()),
                ("port".to_string(), "{{lookup('cluster','port')}}".into()),
            ]),
            ..Default::default()
        }
    }

    fn node() -> ClusterNode {
        ClusterNode::new("test_node")
            .with_hostname("test_hostname")
            .with_internal_ip("1.1.1.1")
            .with_external_ip("2.2.2.2")
    }

    fn status() -> DeploymentStatus {
        DeploymentStatus {
            is_deployed: true,
            desired_nodes: 1,
            available_nodes: 1,
            node_ports: BTreeMap::from([(80, 30001)]),
            cluster_ports: [80].into(),
            ..Default::default()
        }
    }

    fn is_token(value: &str) -> bool {
        value.len() == 32 && value.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
    }

    #[test]
    fn test_chart_values_generate_password() {
        let service = service();
        let plan = Plan::default();
        let values = resolve_chart_values(&ServicePlan::new(&service, &plan), &ProcessEnv);

        assert_eq!(values["foo"], "bar");
        assert!(is_token(&values["password"]));
    }

    #[test]
    fn test_chart_values_share_secret_per_call() {
        let service = Service {
            chart_values: BTreeMap::from([
                ("a".to_string(), "{{ lookup('password','p') }}".to_string()),
                ("b".to_string(), "{{ lookup('password','p') }}".to_string()),
                ("c".to_string(), "{{ lookup('password','q') }}".to_string()),
                ("d".to_string(), "{{ lookup('username','p') }}".to_string()),
            ]),
            ..Default::default()
        };
        let plan = Plan::default();
        let selection = ServicePlan::new(&service, &plan);
        let values = resolve_chart_values(&selection, &ProcessEnv);

        assert_eq!(values["a"], values["b"]);
        assert!(is_token(&values["a"]));
        assert_ne!(values["a"], values["c"]);
        assert_ne!(values["a"], values["d"]);

        let again = resolve_chart_values(&selection, &ProcessEnv);
        assert_ne!(values["a"], again["a"]);
    }

    #[test]
    fn test_chart_values_env_and_unsupported_lookups() {
        let service = Service {
            chart_values: BTreeMap::from([
                ("region".to_string(), "eu-{{ lookup('env', 'REGION') }}".to_string()),
                ("missing".to_string(), "{{ lookup('env', 'UNSET') }}".to_string()),
                ("value".to_string(), "{{ lookup('value', 'foo') }}".to_string()),
                ("cluster".to_string(), "{{ lookup('cluster', 'address') }}".to_string()),
                ("empty".to_string(), String::new()),
            ]),
            ..Default::default()
        };
        let plan = Plan::default();
        let env = HashMap::from([("REGION".to_string(), "west".to_string())]);
        let values = resolve_chart_values(&ServicePlan::new(&service, &plan), &env);

        assert_eq!(
            values,
            BTreeMap::from([("region".to_string(), "eu-west".to_string())])
        );
    }

    #[test]
    fn test_chart_values_plan_override() {
        let service = service();
        let plan = Plan {
            chart_values: BTreeMap::from([("foo".to_string(), "baz".to_string())]),
            ..Default::default()
        };
        let values = resolve_chart_values(&ServicePlan::new(&service, &plan), &ProcessEnv);

        assert_eq!(values["foo"], "baz");
        assert!(values.contains_key("password"));
    }

    #[test]
    fn test_user_credentials() {
        let service = service();
        let plan = Plan::default();
        let deployed: FlatValues = [("foo", "bar")].into_iter().collect();
        let nodes = [node()];
        let status = status();
        let ctx = ResolutionContext {
            deployed_values: &deployed,
            nodes: &nodes,
            status: &status,
            domain: None,
        };

        let credentials = resolve_user_credentials(&ServicePlan::new(&service, &plan), &ctx);

        assert_eq!(
            credentials,
            BTreeMap::from([
                ("key".to_string(), Credential::Single("bar".to_string())),
                ("hostname".to_string(), Credential::Single("2.2.2.2".to_string())),
                ("port".to_string(), Credential::Single("30001".to_string())),
            ])
        );
    }

    #[test]
    fn test_user_credentials_cluster_lookups() {
        let service = Service {
            user_credentials: BTreeMap::from([
                ("address".to_string(), "{{ lookup('cluster', 'address') }}".into()),
                ("host".to_string(), "{{ lookup('cluster', 'hostname') }}".into()),
                ("https".to_string(), "{{ lookup('cluster', 'port:443') }}".into()),
                ("missing".to_string(), "{{ lookup('cluster', 'port:8080') }}".into()),
                ("other".to_string(), "{{ lookup('cluster', 'zone') }}".into()),
            ]),
            ..Default::default()
        };
        let plan = Plan::default();
        let deployed = FlatValues::new();
        let nodes = [node()];
        let mut status = status();
        status.node_ports.insert(443, 30443);
        let ctx = ResolutionContext {
            deployed_values: &deployed,
            nodes: &nodes,
            status: &status,
            domain: Some("db.example.com"),
        };

        let credentials = resolve_user_credentials(&ServicePlan::new(&service, &plan), &ctx);

        assert_eq!(credentials["address"].as_str(), Some("db.example.com"));
        assert_eq!(credentials["host"].as_str(), Some("test_hostname"));
        assert_eq!(credentials["https"].as_str(), Some("30443"));
        assert_eq!(credentials["missing"].as_str(), Some("0"));
        assert!(!credentials.contains_key("other"));
    }

    #[test]
    fn test_user_credentials_lists() {
        let service = Service {
            user_credentials: BTreeMap::from([
                (
                    "uris".to_string(),
                    CredentialTemplate::List(vec![
                        "cql://{{ lookup('cluster', 'address') }}".to_string(),
                        "{{ lookup('value', 'missing') }}".to_string(),
                        "{{ lookup('username', 'user') }}".to_string(),
                    ]),
                ),
                (
                    "empty".to_string(),
                    CredentialTemplate::List(vec!["{{ lookup('value', 'missing') }}".to_string()]),
                ),
                ("blank".to_string(), "{{ lookup('password', 'missing') }}".into()),
            ]),
            ..Default::default()
        };
        let plan = Plan::default();
        let deployed: FlatValues = [("user", "admin")].into_iter().collect();
        let nodes = [ClusterNode::new("n").with_internal_ip("10.0.0.1")];
        let status = DeploymentStatus::default();
        let ctx = ResolutionContext {
            deployed_values: &deployed,
            nodes: &nodes,
            status: &status,
            domain: None,
        };

        let credentials = resolve_user_credentials(&ServicePlan::new(&service, &plan), &ctx);

        assert_eq!(
            credentials["uris"],
            Credential::List(vec!["cql://10.0.0.1".to_string(), "admin".to_string()])
        );
        assert!(!credentials.contains_key("empty"));
        assert!(!credentials.contains_key("blank"));
    }

    #[test]
    fn test_credential_serializes_untagged() {
        let credentials = BTreeMap::from([
            ("host".to_string(), Credential::Single("h".to_string())),
            ("ports".to_string(), Credential::List(vec!["1".to_string(), "2".to_string()])),
        ]);

        let json = serde_json::to_string(&credentials).unwrap();
        assert_eq!(json, r#"{"host":"h","ports":["1","2"]}"#);
    }
}
