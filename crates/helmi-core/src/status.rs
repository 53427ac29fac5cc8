//! Release status parsing
//!
//! `helm status` prints a human readable report rather than structured data:
//!
//! ```text
//! LAST DEPLOYED: Mon Jan  8 14:02:48 2018
//! NAMESPACE: default
//! STATUS: DEPLOYED
//!
//! RESOURCES:
//! ==> v1/Service
//! NAME            TYPE      CLUSTER-IP  EXTERNAL-IP  PORT(S)         AGE
//! helmi1234abcd   NodePort  10.0.0.158  <none>       3306:31134/TCP  1m
//!
//! ==> v1beta1/Deployment
//! NAME           DESIRED  CURRENT  UP-TO-DATE  AVAILABLE  AGE
//! helmi1234abcd  1        1        1           0          1m
//! ```
//!
//! The report is read in a single pass. Resource tables are separated by blank
//! lines; a table header fixes the column offsets used for the rows below it.
//! Fields that cannot be read are skipped, the parser never fails.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Default time an under-provisioned release may take before it counts as failed
pub const DEFAULT_STALENESS_TIMEOUT: Duration = Duration::minutes(30);

const STATUS_FAILED: &str = "STATUS: FAILED";
const STATUS_DEPLOYED: &str = "STATUS: DEPLOYED";
const RESOURCE_PREFIX: &str = "==> ";
const NAMESPACE_PREFIX: &str = "NAMESPACE: ";
const LAST_DEPLOYED_PREFIX: &str = "LAST DEPLOYED: ";

const DESIRED_LABEL: &str = "DESIRED";
const CURRENT_LABEL: &str = "CURRENT";
const AVAILABLE_LABEL: &str = "AVAILABLE";
const PORTS_LABEL: &str = "PORT(S)";

/// `asctime` layout used by `LAST DEPLOYED`
pub const LAST_DEPLOYED_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Parse layout once runs of spaces are collapsed
const LAST_DEPLOYED_PARSE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Structured view of a release status report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    /// Release name
    pub name: String,

    /// Namespace the release is deployed to
    pub namespace: String,

    /// Failed explicitly, or stuck below its desired size past the timeout
    pub is_failed: bool,

    pub is_deployed: bool,

    /// Desired replicas summed over all workloads
    pub desired_nodes: u32,

    /// Available replicas summed over all workloads
    pub available_nodes: u32,

    /// Cluster port -> node port
    pub node_ports: BTreeMap<u16, u16>,

    pub cluster_ports: BTreeSet<u16>,

    /// `None` when the report had no readable timestamp
    pub last_deployed_at: Option<DateTime<Utc>>,
}

impl DeploymentStatus {
    /// All desired replicas are available
    pub fn is_available(&self) -> bool {
        self.available_nodes >= self.desired_nodes
    }

    /// Under-provisioned for longer than `timeout`
    ///
    /// A missing timestamp counts as infinitely old. A deadline past the
    /// representable range is never reached.
    pub fn is_stale(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        if self.is_available() {
            return false;
        }
        match self.last_deployed_at {
            Some(deployed_at) => deployed_at
                .checked_add_signed(timeout)
                .is_some_and(|deadline| now > deadline),
            None => true,
        }
    }

    /// Node port exposing `cluster_port`
    pub fn node_port(&self, cluster_port: u16) -> Option<u16> {
        self.node_ports.get(&cluster_port).copied()
    }

    /// Node port of the lowest exposed cluster port
    pub fn first_node_port(&self) -> Option<u16> {
        self.node_ports.values().next().copied()
    }
}

/// Turns raw status output into a [`DeploymentStatus`]
pub trait StatusParser: Send + Sync {
    fn parse(&self, raw: &str) -> DeploymentStatus;
}

/// Column-offset parser for Helm v2 `helm status` output
#[derive(Debug, Clone, Copy)]
pub struct ColumnStatusParser {
    timeout: Duration,
}

impl ColumnStatusParser {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Parse with an explicit clock for the staleness check
    pub fn parse_at(&self, raw: &str, now: DateTime<Utc>) -> DeploymentStatus {
        let mut scan = Scan::default();
        for line in raw.lines() {
            scan.line(line.trim_end_matches('\r'));
        }

        let mut status = scan.status;
        if status.is_stale(self.timeout, now) {
            status.is_failed = true;
        }
        status
    }
}

impl Default for ColumnStatusParser {
    fn default() -> Self {
        Self::new(DEFAULT_STALENESS_TIMEOUT)
    }
}

impl StatusParser for ColumnStatusParser {
    fn parse(&self, raw: &str) -> DeploymentStatus {
        self.parse_at(raw, Utc::now())
    }
}

/// Parse a status report against the current time
pub fn parse_status(raw: &str, timeout: Duration) -> DeploymentStatus {
    ColumnStatusParser::new(timeout).parse(raw)
}

/// Column offsets of the current resource table
#[derive(Debug, Default)]
struct Columns {
    desired: Option<usize>,
    current: Option<usize>,
    available: Option<usize>,
    ports: Option<usize>,
}

#[derive(Debug, Default)]
struct Scan {
    status: DeploymentStatus,
    resource: Option<String>,
    columns: Columns,
}

impl Scan {
    fn line(&mut self, line: &str) {
        if line.starts_with(STATUS_FAILED) {
            self.status.is_failed = true;
        }
        if line.starts_with(STATUS_DEPLOYED) {
            self.status.is_deployed = true;
        }

        if line.is_empty() {
            self.resource = None;
            self.columns = Columns::default();
            return;
        }

        if let Some(resource) = line.strip_prefix(RESOURCE_PREFIX) {
            self.resource = Some(resource.to_string());
        }
        if let Some(namespace) = line.strip_prefix(NAMESPACE_PREFIX) {
            self.status.namespace = namespace.to_string();
        }
        if let Some(timestamp) = line.strip_prefix(LAST_DEPLOYED_PREFIX) {
            self.status.last_deployed_at = parse_last_deployed(timestamp);
        }

        self.replicas(line);
        self.ports(line);
    }

    fn replicas(&mut self, line: &str) {
        let desired = line.find(DESIRED_LABEL);
        let current = line.find(CURRENT_LABEL);

        if desired.is_some() && current.is_some() {
            self.columns.desired = desired;
            self.columns.current = current;
            if let Some(available) = line.find(AVAILABLE_LABEL) {
                self.columns.available = Some(available);
            }
            return;
        }

        let (Some(desired_col), Some(current_col)) = (self.columns.desired, self.columns.current)
        else {
            return;
        };

        let desired = self.count_at(line, desired_col, DESIRED_LABEL);
        let mut available = self.count_at(line, current_col, CURRENT_LABEL);
        if let Some(available_col) = self.columns.available {
            if let Some(count) = self.count_at(line, available_col, AVAILABLE_LABEL) {
                available = Some(count);
            }
        }

        self.status.desired_nodes = self
            .status
            .desired_nodes
            .saturating_add(desired.unwrap_or(0));
        self.status.available_nodes = self
            .status
            .available_nodes
            .saturating_add(available.unwrap_or(0));
    }

    fn ports(&mut self, line: &str) {
        if let Some(col) = line.find(PORTS_LABEL) {
            self.columns.ports = Some(col);
            return;
        }

        let Some(col) = self.columns.ports else {
            return;
        };
        let Some(token) = token_at(line, col) else {
            self.degraded(line, PORTS_LABEL);
            return;
        };

        for entry in token.split(',') {
            let fields: Vec<&str> = entry
                .split([':', '/'])
                .filter(|f| !f.is_empty())
                .collect();

            match fields.as_slice() {
                [cluster, _protocol] => {
                    if let Ok(cluster) = cluster.parse::<u16>() {
                        self.status.cluster_ports.insert(cluster);
                    }
                }
                [cluster, node, _protocol] => {
                    if let (Ok(cluster), Ok(node)) = (cluster.parse::<u16>(), node.parse::<u16>())
                    {
                        self.status.node_ports.insert(cluster, node);
                        self.status.cluster_ports.insert(cluster);
                    }
                }
                _ => {}
            }
        }
    }

    fn count_at(&self, line: &str, col: usize, label: &str) -> Option<u32> {
        let count = token_at(line, col).and_then(|t| t.parse::<u32>().ok());
        if count.is_none() {
            self.degraded(line, label);
        }
        count
    }

    fn degraded(&self, line: &str, field: &str) {
        tracing::debug!(
            resource = self.resource.as_deref().unwrap_or(""),
            field,
            line,
            "ignoring unreadable status field"
        );
    }
}

/// Whitespace-delimited token starting at byte column `col`
fn token_at(line: &str, col: usize) -> Option<&str> {
    line.get(col..)?.split_whitespace().next()
}

/// Parse an `asctime` timestamp in the local timezone
fn parse_last_deployed(text: &str) -> Option<DateTime<Utc>> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&text, LAST_DEPLOYED_PARSE_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
