//! Execution of a single service check.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, debug_span, error, info};

use crate::collaborators::{CrashContext, CrashReporter, TimeperiodOracle};
use crate::error::{CheckError, RunError};
use crate::parameters::{merge, ParamValue, Parameters};
use crate::plugin::cluster::ClusterDispatcher;
use crate::plugin::registry::{CheckArgs, CheckFunction, CheckPlugin, NodeSections, PluginRegistry};
use crate::plugin::types::State;
use crate::results::{aggregate_results, consume_check_results, ServiceCheckResult};
use crate::sections::{CacheInfo, SectionArgs, SectionView};
use crate::service::{ConfiguredService, HostConfig};
use crate::store::CounterStore;

/// Outcome of one service in one run
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    pub service: ConfiguredService,
    /// False when there is no fresh verdict to hand to the core
    pub submit: bool,
    pub data_received: bool,
    pub result: ServiceCheckResult,
    pub cache_info: Option<CacheInfo>,
}

impl AggregatedResult {
    fn new(
        service: &ConfiguredService,
        submit: bool,
        data_received: bool,
        result: ServiceCheckResult,
    ) -> Self {
        Self { service: service.clone(), submit, data_received, result, cache_info: None }
    }
}

/// Everything needed to check the services of one host
#[derive(Clone)]
pub struct ServiceExecutor {
    pub(crate) host: Arc<HostConfig>,
    pub(crate) registry: Arc<PluginRegistry>,
    pub(crate) sections: Arc<dyn SectionView>,
    pub(crate) timeperiods: Arc<dyn TimeperiodOracle>,
    pub(crate) crash_reporter: Arc<dyn CrashReporter>,
    pub(crate) cluster_dispatcher: Arc<dyn ClusterDispatcher>,
    pub(crate) store: Arc<CounterStore>,
    pub(crate) debug: bool,
}

/// Section data a check function is called with
enum Input {
    Host(SectionArgs),
    Cluster(NodeSections),
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "check function panicked".to_string()
    }
}

impl ServiceExecutor {
    /// Check one service
    ///
    /// Only a timeout (and, in debug mode, crashes and parameter errors) is
    /// returned as an error; everything else becomes an outcome.
    pub fn execute(&self, service: &ConfiguredService) -> Result<AggregatedResult, RunError> {
        let span = debug_span!(
            "service",
            description = %service.description,
            plugin = %service.plugin,
            item = ?service.item
        );
        let _entered = span.enter();

        let Some(plugin) = self.registry.get(&service.plugin) else {
            debug!("No plugin registered for {}", service.plugin);
            let result = ServiceCheckResult::check_not_implemented();
            return Ok(AggregatedResult::new(service, true, true, result));
        };

        let Some(input) = self.input(&plugin) else {
            debug!("No monitoring data for {}", service.description);
            let result = if self.host.is_cluster() {
                ServiceCheckResult::cluster_received_no_data(&self.host.nodes)
            } else {
                ServiceCheckResult::received_no_data()
            };
            return Ok(AggregatedResult::new(service, false, false, result));
        };

        let params = match &plugin.default_parameters {
            Some(defaults) => Some(self.resolve_parameters(service, defaults)?),
            None => None,
        };

        let function: Arc<dyn CheckFunction> = match input {
            Input::Host(_) => plugin.check.clone(),
            Input::Cluster(_) => {
                self.cluster_dispatcher.check_function(service.cluster_mode, &plugin)
            }
        };
        let (sections, nodes) = match input {
            Input::Host(sections) => (sections, NodeSections::new()),
            Input::Cluster(nodes) => (SectionArgs::new(), nodes),
        };
        let args = CheckArgs {
            item: service.item.as_deref(),
            params: params.as_ref(),
            sections: &sections,
            nodes: &nodes,
        };

        let service_id = service.id();
        let mut values = self.store.checkout(&service_id);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            consume_check_results(function.check(args, &mut values)).map(aggregate_results)
        }));
        self.store.checkin(&service_id, values);

        let error = match outcome {
            Ok(Ok(result)) => {
                let mut aggregated = AggregatedResult::new(service, true, true, result);
                aggregated.cache_info = self.sections.cache_info(&plugin.sections);
                return Ok(aggregated);
            }
            Ok(Err(CheckError::IgnoreResults(message))) => {
                info!("Pending result for {}: {}", service.description, message);
                let result = ServiceCheckResult::ignored(&message);
                return Ok(AggregatedResult::new(service, false, true, result));
            }
            Ok(Err(CheckError::Timeout)) => return Err(RunError::Timeout),
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        if self.debug {
            let service = service.description.clone();
            return Err(RunError::PluginCrash { service, message: error });
        }
        error!("Check of {} crashed: {}", service.description, error);
        let context = CrashContext {
            host: self.host.name.clone(),
            service: service_id,
            description: service.description.clone(),
            parameters: params,
            is_enforced: service.is_enforced,
            error,
        };
        let output = self.crash_reporter.create_check_crash_dump(&context);
        let result = ServiceCheckResult::new(State::Unknown, output, Vec::new());
        Ok(AggregatedResult::new(service, true, true, result))
    }

    fn input(&self, plugin: &CheckPlugin) -> Option<Input> {
        let host_keys = self.host.host_keys(&plugin.name);
        if self.host.is_cluster() {
            let nodes: NodeSections = host_keys
                .iter()
                .filter_map(|key| {
                    Some((key.hostname.clone(), self.sections.lookup(key, &plugin.sections)?))
                })
                .collect();
            return (!nodes.is_empty()).then_some(Input::Cluster(nodes));
        }
        let key = host_keys.first()?;
        self.sections.lookup(key, &plugin.sections).map(Input::Host)
    }

    /// Evaluate the service's rules on top of the plugin defaults
    fn resolve_parameters(
        &self,
        service: &ConfiguredService,
        defaults: &Parameters,
    ) -> Result<Parameters, RunError> {
        let evaluated = service
            .parameters
            .evaluate(self.timeperiods.as_ref(), self.debug)
            .map_err(|source| RunError::Parameters {
                service: service.description.clone(),
                source,
            })?;
        let defaults = ParamValue::Map(
            defaults.iter().map(|(key, value)| (key.clone(), value.clone())).collect(),
        );
        Ok(Parameters::wrap(merge(&[evaluated], &defaults)))
    }
}
