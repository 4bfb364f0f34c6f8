//! Checking all services of one host.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use super::{Engine, RunPlugins};
use crate::collaborators::{Submission, Submitter};
use crate::error::RunError;
use crate::executor::{AggregatedResult, ServiceExecutor};
use crate::sections::SectionView;
use crate::service::{ConfiguredService, HostConfig};
use crate::store::{CounterStore, CounterStoreGuard};

impl Engine {
    /// Check the services of a host and submit their outcomes in one batch
    ///
    /// Services outside the run set or their check period are skipped. The
    /// counter store is opened once for the run and released on every exit
    /// path.
    pub async fn check_host(
        &self,
        host: &HostConfig,
        services: &[ConfiguredService],
        sections: Arc<dyn SectionView>,
        run_plugins: &RunPlugins,
        submitter: &dyn Submitter,
    ) -> Result<Vec<AggregatedResult>, RunError> {
        self.check_services(host, services, sections, run_plugins, submitter)
            .instrument(info_span!("host", host = %host.name))
            .await
    }

    pub(crate) async fn check_services(
        &self,
        host: &HostConfig,
        services: &[ConfiguredService],
        sections: Arc<dyn SectionView>,
        run_plugins: &RunPlugins,
        submitter: &dyn Submitter,
    ) -> Result<Vec<AggregatedResult>, RunError> {
        let store = Arc::new(CounterStore::open(&host.name, self.backend.clone(), self.read_only)?);
        let guard = CounterStoreGuard::new(store.clone());

        let selected: Vec<ConfiguredService> = services
            .iter()
            .filter(|service| self.should_run(service, run_plugins))
            .cloned()
            .collect();
        debug!("Checking {} of {} services", selected.len(), services.len());

        let executor = Arc::new(ServiceExecutor {
            host: Arc::new(host.clone()),
            registry: self.registry.clone(),
            sections,
            timeperiods: self.collaborators.timeperiods.clone(),
            crash_reporter: self.collaborators.crash_reporter.clone(),
            cluster_dispatcher: self.cluster_dispatcher.clone(),
            store,
            debug: self.settings.debug,
        });

        let run = run_services(executor, selected, self.settings.workers());
        let outcomes =
            timeout(self.settings.run_timeout(), run).await.map_err(|_| RunError::Timeout)??;

        let pending = outcomes.iter().filter(|outcome| !outcome.submit).count();
        if pending > 0 {
            info!("{} of {} service results are pending", pending, outcomes.len());
        }
        let batch: Vec<Submission> = outcomes
            .iter()
            .map(|outcome| Submission {
                description: outcome.service.description.clone(),
                result: outcome.result.clone(),
                cache_info: outcome.cache_info,
                pending: !outcome.submit,
            })
            .collect();
        submitter.submit(batch).await.map_err(RunError::Submission)?;

        guard.release()?;
        Ok(outcomes)
    }

    fn should_run(&self, service: &ConfiguredService, run_plugins: &RunPlugins) -> bool {
        if !run_plugins.contains(&service.plugin) {
            debug!("Skipping {}: plugin not in this run", service.description);
            return false;
        }
        let Some(check_period) = &service.check_period else {
            return true;
        };
        match self.collaborators.timeperiods.is_active(check_period) {
            Ok(true) => true,
            Ok(false) => {
                debug!(
                    "Skipping {}: outside of check period {}",
                    service.description, check_period
                );

                false
            }
            Err(err) => {
                warn!("Checking {} regardless of its check period: {}", service.description, err);
                true
            }
        }
    }
}

/// Run every service on the blocking pool, at most `workers` at a time
///
/// Outcomes keep the order of `services`. The first run level error aborts
/// the remaining services.
async fn run_services(
    executor: Arc<ServiceExecutor>,
    services: Vec<ConfiguredService>,
    workers: usize,
) -> Result<Vec<AggregatedResult>, RunError> {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    for (index, service) in services.into_iter().enumerate() {
        let executor = executor.clone();
        let semaphore = semaphore.clone();
        let span = Span::current();
        tasks.spawn(async move {
            let _permit =
                semaphore.acquire_owned().await.map_err(|e| RunError::Worker(e.to_string()))?;

            let outcome = tokio::task::spawn_blocking(move || {
                let _entered = span.enter();
                executor.execute(&service)
            })
            .await
            .map_err(|e| RunError::Worker(e.to_string()))??;
            Ok::<_, RunError>((index, outcome))
        });
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.map_err(|e| RunError::Worker(e.to_string()))??);
    }
    outcomes.sort_by_key(|(index, _)| *index);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}
