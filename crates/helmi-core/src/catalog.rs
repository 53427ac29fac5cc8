//! Service catalog
//!
//! The catalog is loaded once at startup from `catalog.yaml`. Each service
//! names a Helm chart and the templates used to build its chart values and
//! bind credentials; plans may override any of them.
//!
//! ```yaml
//! - _id: 201cb950-e640-4453-9d91-4708ea0a1342
//!   _name: mariadb
//!   description: MariaDB database
//!   chart: stable/mariadb
//!   chart-version: 2.1.0
//!   chart-values:
//!     mariadbUser: "{{ lookup('username', 'mariadb') }}"
//!   user-credentials:
//!     host: "{{ lookup('cluster', 'address') }}"
//!   plans:
//!     - _id: 7b16d6aa-260a-4b8d-b12c-464d2cedb9d0
//!       _name: dev
//!       chart-values:
//!         persistence.enabled: false
//! ```

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::values::scalar_to_string;

/// All services offered by the broker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub services: Vec<Service>,
}

/// A service offering backed by a Helm chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "_id", deserialize_with = "deserialize_scalar")]
    pub id: String,

    #[serde(rename = "_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Chart reference, e.g. `stable/mariadb`
    #[serde(default)]
    pub chart: String,

    #[serde(
        default,
        rename = "chart-version",
        deserialize_with = "deserialize_scalar"
    )]
    pub chart_version: String,

    /// Templates for `--set` values passed at install time
    #[serde(
        default,
        rename = "chart-values",
        deserialize_with = "deserialize_scalar_map"
    )]
    pub chart_values: BTreeMap<String, String>,

    /// Templates for credentials returned on bind
    #[serde(default, rename = "user-credentials")]
    pub user_credentials: BTreeMap<String, CredentialTemplate>,

    #[serde(default)]
    pub plans: Vec<Plan>,
}

/// A plan of a service; non-empty fields override the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "_id", deserialize_with = "deserialize_scalar")]
    pub id: String,

    #[serde(rename = "_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub chart: String,

    #[serde(
        default,
        rename = "chart-version",
        deserialize_with = "deserialize_scalar"
    )]
    pub chart_version: String,

    #[serde(
        default,
        rename = "chart-values",
        deserialize_with = "deserialize_scalar_map"
    )]
    pub chart_values: BTreeMap<String, String>,

    #[serde(default, rename = "user-credentials")]
    pub user_credentials: BTreeMap<String, CredentialTemplate>,
}

/// A credential template: a single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialTemplate {
    Single(String),
    List(Vec<String>),
}

impl From<&str> for CredentialTemplate {
    fn from(template: &str) -> Self {
        Self::Single(template.to_string())
    }
}

impl Catalog {
    /// Load the catalog from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::CatalogNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a catalog document
    ///
    /// Accepts either a bare list of services or a mapping with a
    /// `services` key.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document: YamlValue = serde_yaml::from_str(yaml)?;
        match document {
            YamlValue::Null => Ok(Self::default()),
            YamlValue::Sequence(_) => Ok(Self {
                services: serde_yaml::from_value(document)?,
            }),
            YamlValue::Mapping(_) => Ok(serde_yaml::from_value(document)?),
            _ => Err(CoreError::InvalidCatalog {
                message: "expected a list of services or a 'services' mapping".to_string(),
            }),
        }
    }

    /// Find a service by id (case-insensitive)
    pub fn service(&self, service_id: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(service_id))
    }

    /// Find a plan by service and plan id (case-insensitive)
    pub fn plan(&self, service_id: &str, plan_id: &str) -> Option<&Plan> {
        self.service(service_id)?.plan(plan_id)
    }

    /// Resolve a service/plan pair, failing on unknown ids
    pub fn select(&self, service_id: &str, plan_id: &str) -> Result<ServicePlan<'_>> {
        let service = self
            .service(service_id)
            .ok_or_else(|| CoreError::UnknownService {
                service_id: service_id.to_string(),
            })?;
        let plan = service.plan(plan_id).ok_or_else(|| CoreError::UnknownPlan {
            service_id: service_id.to_string(),
            plan_id: plan_id.to_string(),
        })?;
        Ok(ServicePlan::new(service, plan))
    }
}

impl Service {
    /// Find one of this service's plans by id (case-insensitive)
    pub fn plan(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id.eq_ignore_ascii_case(plan_id))
    }
}

/// A service together with one of its plans
///
/// All plan-over-service precedence rules live here.
#[derive(Debug, Clone, Copy)]
pub struct ServicePlan<'a> {
    pub service: &'a Service,
    pub plan: &'a Plan,
}

impl<'a> ServicePlan<'a> {
    pub fn new(service: &'a Service, plan: &'a Plan) -> Self {
        Self { service, plan }
    }

    /// Chart reference: the plan's if set, else the service's
    pub fn chart(&self) -> Result<&'a str> {
        let (service, plan) = (self.service, self.plan);
        first_non_empty(&plan.chart, &service.chart).ok_or_else(|| {
            CoreError::ChartNotSpecified {
                service_id: self.service.id.clone(),
                plan_id: self.plan.id.clone(),
            }
        })
    }

    /// Chart version: the plan's if set, else the service's
    ///
    /// `None` installs the latest version.
    pub fn chart_version(&self) -> Option<&'a str> {
        let (service, plan) = (self.service, self.plan);
        first_non_empty(&plan.chart_version, &service.chart_version)
    }

    /// Chart value templates, plan entries replacing service entries per key
    pub fn chart_values(&self) -> BTreeMap<String, String> {
        merge_maps(&self.service.chart_values, &self.plan.chart_values)
    }

    /// Credential templates, plan entries replacing service entries per key
    pub fn user_credentials(&self) -> BTreeMap<String, CredentialTemplate> {
        merge_maps(&self.service.user_credentials, &self.plan.user_credentials)
    }
}

fn first_non_empty<'a>(preferred: &'a str, fallback: &'a str) -> Option<&'a str> {
    [preferred, fallback].into_iter().find(|s| !s.is_empty())
}

fn merge_maps<V: Clone>(
    base: &BTreeMap<String, V>,
    overlay: &BTreeMap<String, V>,
) -> BTreeMap<String, V> {
    let mut merged = base.clone();
    merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Ids and versions such as `1.0` may be read as numbers; keep them as strings
fn deserialize_scalar<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match YamlValue::deserialize(deserializer)? {
        YamlValue::Null => Ok(String::new()),
        other => scalar_to_string(&other)
            .ok_or_else(|| D::Error::custom("expected a string, number or boolean")),
    }
}

/// Chart values may be written as any YAML scalar; keep them as strings
fn deserialize_scalar_map<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, YamlValue>> = Option::deserialize(deserializer)?;
    let mut values = BTreeMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let text = match value {
            YamlValue::Null => String::new(),
            other => scalar_to_string(&other).ok_or_else(|| {
                D::Error::custom(format!("chart value '{key}' must be a scalar"))
            })?,
        };
        values.insert(key, text);
    }
    Ok(values)
}
