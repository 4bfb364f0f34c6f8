//! Hosts and configured services as handed over by the configuration layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::parameters::TimespecificParameters;

/// Identity of a service: plugin name plus optional item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId {
    pub plugin: String,
    pub item: Option<String>,
}

impl ServiceId {
    pub fn new(plugin: impl Into<String>, item: Option<String>) -> Self {
        Self { plugin: plugin.into(), item }
    }

    /// Key of the service's namespace in the counter store
    pub fn storage_key(&self) -> String {
        match &self.item {
            Some(item) => format!("{}/{}", self.plugin, item),
            None => self.plugin.clone(),
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item {
            Some(item) => write!(f, "{}({})", self.plugin, item),
            None => write!(f, "{}", self.plugin),
        }
    }
}

/// How a clustered service combines the data of the cluster nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    /// Hand the data of all nodes to the plugin at once
    #[default]
    Native,
    /// Use the first node that delivered data
    Failover,
    /// Evaluate every node, keep the worst outcome
    Worst,
    /// Evaluate every node, keep the best outcome
    Best,
}

/// A service configured for a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredService {
    pub plugin: String,
    #[serde(default)]
    pub item: Option<String>,
    pub description: String,
    #[serde(default)]
    pub parameters: TimespecificParameters,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Configured manually rather than discovered
    #[serde(default)]
    pub is_enforced: bool,
    /// Timeperiod outside of which the service is not checked
    #[serde(default)]
    pub check_period: Option<String>,
    #[serde(default)]
    pub cluster_mode: ClusterMode,
}

impl ConfiguredService {
    pub fn new(
        plugin: impl Into<String>,
        item: Option<&str>,
        description: impl Into<String>,
    ) -> Self {

        Self {
            plugin: plugin.into(),
            item: item.map(str::to_string),
            description: description.into(),
            parameters: TimespecificParameters::default(),
            labels: BTreeMap::new(),
            is_enforced: false,
            check_period: None,
            cluster_mode: ClusterMode::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: TimespecificParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_check_period(mut self, timeperiod: impl Into<String>) -> Self {
        self.check_period = Some(timeperiod.into());
        self
    }

    pub fn with_cluster_mode(mut self, mode: ClusterMode) -> Self {
        self.cluster_mode = mode;
        self
    }

    pub fn enforced(mut self) -> Self {
        self.is_enforced = true;
        self
    }

    pub fn id(&self) -> ServiceId {
        ServiceId::new(self.plugin.clone(), self.item.clone())
    }
}

/// Where a section came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Host,
    Management,
}

/// Address of one host's section data
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostKey {
    pub hostname: String,
    #[serde(default)]
    pub source_type: SourceType,
}

impl HostKey {
    pub fn new(hostname: impl Into<String>, source_type: SourceType) -> Self {
        Self { hostname: hostname.into(), source_type }
    }

    pub fn host(hostname: impl Into<String>) -> Self {
        Self::new(hostname, SourceType::Host)
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source_type {
            SourceType::Host => write!(f, "{}", self.hostname),
            SourceType::Management => write!(f, "{} (management)", self.hostname),
        }
    }
}

/// The host (or cluster) a run is performed for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    pub name: String,
    /// Node names; non-empty only for clusters
    #[serde(default)]
    pub nodes: Vec<String>,
}

impl HostConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), nodes: Vec::new() }
    }

    pub fn cluster(name: impl Into<String>, nodes: Vec<String>) -> Self {
        Self { name: name.into(), nodes }
    }

    pub fn is_cluster(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Section addresses to look at for a plugin
    ///
    /// Plugins named `mgmt_*` read management board data.
    pub fn host_keys(&self, plugin: &str) -> Vec<HostKey> {
        let source_type =
            if plugin.starts_with("mgmt_") { SourceType::Management } else { SourceType::Host };
        if self.is_cluster() {
            self.nodes.iter().map(|node| HostKey::new(node.clone(), source_type)).collect()
        } else {
            vec![HostKey::new(self.name.clone(), source_type)]
        }
    }
}
