//! Check execution and result aggregation for host monitoring.
//!
//! Given the fetched raw data of a host and its configured services, the
//! engine resolves each service's parameters, runs its check plugin, folds
//! the plugin output into one state/text/metrics outcome and hands all
//! outcomes to a [`Submitter`]. A host report summarizes data source
//! problems, missing data and timings.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hostcheck::{
//!     check_fn, CheckPlugin, CheckResult, Collaborators, ConfiguredService, ConsoleSubmitter,
//!     Engine, EngineSettings, FetchedPayload, HostConfig, HostKey, MemoryBackend, PluginRegistry,
//!     RunPlugins, State,
//! };
//!
//! # async fn run() -> Result<(), hostcheck::RunError> {
//! let mut registry = PluginRegistry::new();
//! registry.register(CheckPlugin::new(
//!     "uptime",
//!     check_fn(|_args, _store| Ok(vec![CheckResult::new(State::Ok, "up").into()])),
//! ));
//! let backend = Arc::new(MemoryBackend::new());
//! let engine =
//!     Engine::new(EngineSettings::default(), registry, Collaborators::default(), backend);
//!
//! let host = HostConfig::new("web01");
//! let payload =
//!     FetchedPayload::output("agent", HostKey::host("web01"), "<<<uptime>>>\n4711\n");
//! let services = [ConfiguredService::new("uptime", None, "Uptime")];
//! let report = engine
//!     .run_host_checks(&host, &services, vec![payload], &RunPlugins::All, &ConsoleSubmitter)
//!     .await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod parameters;
pub mod plugin;
pub mod results;
pub mod sections;
pub mod service;
pub mod store;

pub use collaborators::{
    Collaborators, CollectingSubmitter, ConsoleSubmitter, CrashContext, CrashReporter,
    InventoryHook, MemoryPiggyback, PiggybackSink, RecordingInventory, StaticTimeperiods,
    Submission, Submitter, TextCrashReporter, TimeperiodError, TimeperiodOracle,
};
pub use config::{EngineSettings, ExitSpec};
pub use error::{CheckError, ParameterError, RunError, StoreError};
pub use executor::{AggregatedResult, ServiceExecutor};
pub use orchestrator::{Engine, FetchedPayload, FetcherType, HostReport, RawData, RunPlugins};
pub use parameters::{ParamValue, Parameters, TimespecificParameterSet, TimespecificParameters};
pub use plugin::{
    check_fn, CheckArgs, CheckFunction, CheckItem, CheckPlugin, CheckResult, IgnoreResults,
    LegacyAdapter, LegacyReturn, Metric, PluginRegistry, State,
};

pub use results::ServiceCheckResult;
pub use sections::{CacheInfo, SectionStore, SectionView, StringTable};
pub use service::{ClusterMode, ConfiguredService, HostConfig, HostKey, ServiceId, SourceType};
pub use store::{CounterStore, FileBackend, MemoryBackend, StoreBackend, ValueStore};
