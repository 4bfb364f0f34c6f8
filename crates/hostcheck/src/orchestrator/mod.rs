//! Host level orchestration: running all services of a host and summarizing
//! the run.

pub mod host;
pub mod missing;
pub mod summary;
pub mod timing;

pub use missing::check_plugins_missing_data;
pub use summary::{FetchedPayload, HostReport, RawData};
pub use timing::{timing_results, FetcherType, RunTimer, RunTimes};

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::collaborators::Collaborators;
use crate::config::EngineSettings;
use crate::plugin::cluster::{BuiltinClusterDispatcher, ClusterDispatcher};
use crate::plugin::registry::PluginRegistry;
use crate::store::StoreBackend;

/// Which plugins a run covers
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RunPlugins {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl RunPlugins {
    pub fn only(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        RunPlugins::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, plugin: &str) -> bool {
        match self {
            RunPlugins::All => true,
            RunPlugins::Only(names) => names.contains(plugin),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, RunPlugins::All)
    }
}

/// The check engine: plugins, settings and collaborators shared by all runs
pub struct Engine {
    settings: EngineSettings,
    registry: Arc<PluginRegistry>,
    collaborators: Collaborators,
    backend: Arc<dyn StoreBackend>,
    cluster_dispatcher: Arc<dyn ClusterDispatcher>,
    read_only: bool,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        registry: PluginRegistry,
        collaborators: Collaborators,
        backend: Arc<dyn StoreBackend>,
    ) -> Self {
        Self {
            settings,
            registry: Arc::new(registry),
            collaborators,
            backend,
            cluster_dispatcher: Arc::new(BuiltinClusterDispatcher),
            read_only: false,
        }
    }

    pub fn with_cluster_dispatcher(mut self, dispatcher: Arc<dyn ClusterDispatcher>) -> Self {
        self.cluster_dispatcher = dispatcher;
        self
    }

    /// Never write the counter store back, for previews and dry runs
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_plugins() {
        let only = RunPlugins::only(["df"]);
        assert!(only.contains("df"));
        assert!(!only.contains("uptime"));
        assert!(!only.is_all());
        assert!(RunPlugins::default().contains("anything"));
    }
}
