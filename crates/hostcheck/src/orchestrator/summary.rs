//! The full host run: parse payloads, check services, summarize.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};

use super::missing::check_plugins_missing_data;
use super::timing::{timing_results, FetcherType, RunTimer};
use super::{Engine, RunPlugins};
use crate::collaborators::Submitter;
use crate::error::RunError;
use crate::executor::AggregatedResult;
use crate::plugin::types::{CheckResult, Metric, State};
use crate::sections::{parse_agent_output, SectionStore};
use crate::service::{ConfiguredService, HostConfig, HostKey};

/// What a data source delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawData {
    /// Agent output text
    Output(String),
    /// The fetch failed
    Error(String),
}

/// Raw data of one source, fetched before the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedPayload {
    pub source_id: String,
    #[serde(default)]
    pub fetcher_type: FetcherType,
    pub host_key: HostKey,
    pub data: RawData,
    /// Wall clock time the fetch took
    #[serde(default)]
    pub duration_secs: f64,
}

impl FetchedPayload {
    pub fn output(
        source_id: impl Into<String>,
        host_key: HostKey,
        output: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            fetcher_type: FetcherType::default(),
            host_key,
            data: RawData::Output(output.into()),
            duration_secs: 0.0,
        }
    }

    pub fn error(
        source_id: impl Into<String>,
        host_key: HostKey,
        message: impl Into<String>,
    ) -> Self {
        Self { data: RawData::Error(message.into()), ..Self::output(source_id, host_key, "") }
    }

    pub fn with_fetcher(mut self, fetcher_type: FetcherType, duration_secs: f64) -> Self {
        self.fetcher_type = fetcher_type;
        self.duration_secs = duration_secs;
        self
    }

    fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_secs).unwrap_or_default()
    }
}

/// Host level outcome of a run
#[derive(Debug, Clone, PartialEq)]
pub struct HostReport {
    pub host: String,
    /// Source problems, missing data and timing, in that order
    pub results: Vec<CheckResult>,
    pub metrics: Vec<Metric>,
    pub services: Vec<AggregatedResult>,
}

impl HostReport {
    pub fn state(&self) -> State {
        State::worst(self.results.iter().map(|result| result.state))
    }

    /// Summaries of all results, non-OK ones marked
    pub fn summary(&self) -> String {
        self.results
            .iter()
            .filter(|result| !result.summary.is_empty())
            .map(|result| {
                let marker = result.state.marker();
                if result.summary.contains(marker) {
                    result.summary.clone()
                } else {
                    format!("{}{}", result.summary, marker)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Long output lines that add to the summary
    pub fn details(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|result| !result.details.is_empty() && result.details != result.summary)
            .map(|result| result.details.as_str())
            .collect()
    }
}

/// `STATE - summary | perfdata`, followed by the details
impl fmt::Display for HostReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.state(), self.summary())?;
        if !self.metrics.is_empty() {
            let perfdata: Vec<String> = self.metrics.iter().map(ToString::to_string).collect();
            write!(f, " | {}", perfdata.join(" "))?;
        }
        for line in self.details() {
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}

impl Engine {
    /// Parse the fetched payloads, check the host and summarize the run
    pub async fn run_host_checks(
        &self,
        host: &HostConfig,
        services: &[ConfiguredService],
        payloads: Vec<FetchedPayload>,
        run_plugins: &RunPlugins,
        submitter: &dyn Submitter,
    ) -> Result<HostReport, RunError> {
        self.run_host(host, services, payloads, run_plugins, submitter)
            .instrument(info_span!("host", host = %host.name))
            .await
    }

    async fn run_host(
        &self,
        host: &HostConfig,
        services: &[ConfiguredService],
        payloads: Vec<FetchedPayload>,
        run_plugins: &RunPlugins,
        submitter: &dyn Submitter,
    ) -> Result<HostReport, RunError> {
        let timer = RunTimer::start();
        let exit_spec = &self.settings.exit_spec;
        let now = chrono::Utc::now().timestamp();

        let mut sections = SectionStore::new();
        let mut results = Vec::new();
        let mut fetches = Vec::with_capacity(payloads.len());

        for payload in payloads {
            fetches.push((payload.fetcher_type, payload.duration()));
            let output = match payload.data {
                RawData::Error(message) => {
                    warn!("Source {} failed: {}", payload.source_id, message);
                    let text = format!("[{}] {}", payload.source_id, message);
                    results.push(CheckResult::new(exit_spec.fetch_failure, text));
                    continue;
                }
                RawData::Output(output) => output,
            };

            let parsed = parse_agent_output(&output);
            if !parsed.errors.is_empty() {
                warn!(
                    "Source {} delivered {} malformed part(s)",
                    payload.source_id,
                    parsed.errors.len()
                );
                results.push(CheckResult::with_details(
                    exit_spec.parse_errors,
                    format!("[{}] Parsing of agent output failed", payload.source_id),
                    parsed.errors.join("\n"),
                ));
            }
            if !parsed.piggyback.is_empty() {
                match &self.collaborators.piggyback {
                    Some(sink) => sink.store(&host.name, parsed.piggyback),
                    None => {
                        debug!("Dropping piggyback data for {} host(s)", parsed.piggyback.len())
                    }
                }
            }
            sections.add_parsed(&payload.host_key, parsed.sections, now);
        }

        let outcomes = self
            .check_services(host, services, Arc::new(sections), run_plugins, submitter)
            .await?;

        if run_plugins.is_all() {
            if let Some(inventory) = &self.collaborators.inventory {
                if let Err(err) = inventory.run_inventory(&host.name).await {
                    warn!("Inventory of {} failed: {:#}", host.name, err);
                }
            }
        }

        results.extend(check_plugins_missing_data(&outcomes, exit_spec));

        let (timing, metrics) =
            timing_results(&timer.stop(), &fetches, self.settings.perfdata_with_times);
        results.push(timing);

        Ok(HostReport { host: host.name.clone(), results, metrics, services: outcomes })
    }
}
