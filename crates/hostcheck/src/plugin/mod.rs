pub mod cluster;
pub mod discovery;
pub mod legacy;
pub mod registry;
pub mod types;

pub use cluster::{BuiltinClusterDispatcher, ClusterDispatcher};
pub use discovery::{
    normalize_discovery, DiscoveredService, DiscoveryEntry, LegacyDiscovery, LegacyDiscoveryItem,
};
pub use legacy::{convert_legacy_return, parse_number, LegacyAdapter, LegacyItem, LegacyReturn};
pub use registry::{
    check_fn, CheckArgs, CheckFunction, CheckPlugin, CheckStream, NodeSections, PluginRegistry,
};

pub use types::{CheckItem, CheckResult, IgnoreResults, Metric, State};
