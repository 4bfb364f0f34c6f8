//! Interfaces to the systems around the engine: timeperiods, result
//! submission, crash reports, piggyback storage and inventory.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use uuid::Uuid;

use crate::parameters::Parameters;
use crate::results::ServiceCheckResult;
use crate::sections::{CacheInfo, ParsedSection};
use crate::service::ServiceId;

/// The oracle could not tell whether a timeperiod is active
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Cannot evaluate timeperiod '{name}': {reason}")]
pub struct TimeperiodError {
    pub name: String,
    pub reason: String,
}

impl TimeperiodError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { name: name.into(), reason: reason.into() }
    }
}

/// Answers whether a named timeperiod is currently active
pub trait TimeperiodOracle: Send + Sync {
    fn is_active(&self, timeperiod: &str) -> Result<bool, TimeperiodError>;
}

impl<F> TimeperiodOracle for F
where
    F: Fn(&str) -> Result<bool, TimeperiodError> + Send + Sync,
{
    fn is_active(&self, timeperiod: &str) -> Result<bool, TimeperiodError> {
        self(timeperiod)
    }
}

/// Fixed set of active timeperiods; everything else is inactive
#[derive(Debug, Clone, Default)]
pub struct StaticTimeperiods {
    active: BTreeSet<String>,
}

impl StaticTimeperiods {
    pub fn new(active: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { active: active.into_iter().map(Into::into).collect() }
    }
}

impl TimeperiodOracle for StaticTimeperiods {
    fn is_active(&self, timeperiod: &str) -> Result<bool, TimeperiodError> {
        Ok(self.active.contains(timeperiod))
    }
}

/// One service outcome handed to the submitter
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub description: String,
    pub result: ServiceCheckResult,
    pub cache_info: Option<CacheInfo>,
    /// No fresh verdict; the core should keep the previous state
    pub pending: bool,
}

/// Delivers service outcomes to the monitoring core
#[async_trait::async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, batch: Vec<Submission>) -> Result<()>;
}

/// Keeps every submitted batch, for previews and tests
#[derive(Default)]
pub struct CollectingSubmitter {
    batches: Mutex<Vec<Vec<Submission>>>,
}

impl CollectingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<Submission>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// All submissions in arrival order
    pub fn submissions(&self) -> Vec<Submission> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait::async_trait]
impl Submitter for CollectingSubmitter {
    async fn submit(&self, batch: Vec<Submission>) -> Result<()> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner).push(batch);
        Ok(())
    }
}

/// Prints outcomes to stdout in the classic plugin output notation
#[derive(Debug, Default)]
pub struct ConsoleSubmitter;

impl ConsoleSubmitter {
    pub fn format(submission: &Submission) -> String {
        let result = &submission.result;
        let mut line =
            format!("{:<30} {} - {}", submission.description, result.state, result.output);
        if !result.metrics.is_empty() {
            let perfdata: Vec<String> = result.metrics.iter().map(ToString::to_string).collect();
            line.push_str(" | ");
            line.push_str(&perfdata.join(" "));
        }
        if submission.pending {
            line.push_str(" (pending)");
        }
        line
    }
}

#[async_trait::async_trait]
impl Submitter for ConsoleSubmitter {
    async fn submit(&self, batch: Vec<Submission>) -> Result<()> {
        for submission in &batch {
            println!("{}", Self::format(submission));
        }
        Ok(())
    }
}

/// Everything known about a crashed check
#[derive(Debug, Clone)]
pub struct CrashContext {
    pub host: String,
    pub service: ServiceId,
    pub description: String,
    pub parameters: Option<Parameters>,
    pub is_enforced: bool,
    pub error: String,
}

/// Builds the diagnostic text shown for a crashed check
pub trait CrashReporter: Send + Sync {
    fn create_check_crash_dump(&self, context: &CrashContext) -> String;
}

/// Formats crash details into the service output, tagged with a crash id
#[derive(Debug, Default)]
pub struct TextCrashReporter;

impl CrashReporter for TextCrashReporter {
    fn create_check_crash_dump(&self, context: &CrashContext) -> String {
        let crash_id = Uuid::new_v4();
        let mut text = format!(
            "check failed - please submit a crash report! (Crash-ID: {crash_id})\n\
             Exception: {}\nHost: {}\nPlugin: {}",
            context.error, context.host, context.service.plugin
        );
        if let Some(item) = &context.service.item {
            text.push_str(&format!("\nItem: {item}"));
        }
        if let Some(params) = &context.parameters {
            text.push_str(&format!("\nParameters: {params}"));
        }
        if context.is_enforced {
            text.push_str("\nService is enforced");
        }
        text
    }
}

/// Receives sections a payload carried for other hosts
pub trait PiggybackSink: Send + Sync {
    fn store(&self, source_host: &str, sections: BTreeMap<String, BTreeMap<String, ParsedSection>>);
}

/// Keeps piggyback data in memory, keyed by target host
#[derive(Default)]
pub struct MemoryPiggyback {
    data: Mutex<BTreeMap<String, BTreeMap<String, ParsedSection>>>,
}

impl MemoryPiggyback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections_for(&self, host: &str) -> Option<BTreeMap<String, ParsedSection>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).get(host).cloned()
    }
}

impl PiggybackSink for MemoryPiggyback {
    fn store(
        &self,
        _source_host: &str,
        sections: BTreeMap<String, BTreeMap<String, ParsedSection>>,
    ) {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        for (host, host_sections) in sections {
            data.entry(host).or_default().extend(host_sections);
        }
    }
}

/// Hardware/software inventory run after a full check cycle
#[async_trait::async_trait]
pub trait InventoryHook: Send + Sync {
    async fn run_inventory(&self, host: &str) -> Result<()>;
}

/// Counts inventory runs per host
#[derive(Default)]
pub struct RecordingInventory {
    runs: Mutex<Vec<String>>,
}

impl RecordingInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait::async_trait]
impl InventoryHook for RecordingInventory {
    async fn run_inventory(&self, host: &str) -> Result<()> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).push(host.to_string());
        Ok(())
    }
}

/// Collaborators consulted while checking a host
#[derive(Clone)]
pub struct Collaborators {
    pub timeperiods: Arc<dyn TimeperiodOracle>,
    pub crash_reporter: Arc<dyn CrashReporter>,
    pub piggyback: Option<Arc<dyn PiggybackSink>>,
    pub inventory: Option<Arc<dyn InventoryHook>>,
}

impl Collaborators {
    pub fn new(timeperiods: Arc<dyn TimeperiodOracle>) -> Self {
        Self {
            timeperiods,
            crash_reporter: Arc::new(TextCrashReporter),
            piggyback: None,
            inventory: None,
        }
    }

    pub fn with_crash_reporter(mut self, reporter: Arc<dyn CrashReporter>) -> Self {
        self.crash_reporter = reporter;
        self
    }

    pub fn with_piggyback(mut self, sink: Arc<dyn PiggybackSink>) -> Self {
        self.piggyback = Some(sink);
        self
    }

    pub fn with_inventory(mut self, hook: Arc<dyn InventoryHook>) -> Self {
        self.inventory = Some(hook);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Arc::new(StaticTimeperiods::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParamValue;
    use crate::plugin::types::{Metric, State};

    #[test]
    fn test_closure_oracle() {
        let oracle = |name: &str| -> Result<bool, TimeperiodError> {
            match name {
                "broken" => Err(TimeperiodError::new(name, "no such timeperiod")),
                other => Ok(other == "work"),
            }
        };
        assert_eq!(oracle.is_active("work"), Ok(true));
        assert!(oracle.is_active("broken").is_err());
        assert_eq!(StaticTimeperiods::new(["night"]).is_active("night"), Ok(true));
    }

    #[test]
    fn test_console_format() {
        let submission = Submission {
            description: "Uptime".into(),
            result: ServiceCheckResult::new(
                State::Ok,
                "up 3 days",
                vec![Metric::new("uptime", 259200.0)],
            ),

            cache_info: None,
            pending: false,
        };
        let line = ConsoleSubmitter::format(&submission);
        assert!(line.starts_with("Uptime"));
        assert!(line.ends_with("OK - up 3 days | uptime=259200"));
    }

    #[test]
    fn test_recording_collaborators() {
        let submitter = CollectingSubmitter::new();
        let submission = Submission {
            description: "Memory".into(),
            result: ServiceCheckResult::received_no_data(),
            cache_info: None,
            pending: true,
        };
        tokio_test::block_on(submitter.submit(vec![submission.clone()])).unwrap();
        tokio_test::block_on(submitter.submit(Vec::new())).unwrap();
        assert_eq!(submitter.batches().len(), 2);
        assert_eq!(submitter.submissions(), [submission]);

        let inventory = RecordingInventory::new();
        tokio_test::block_on(inventory.run_inventory("web01")).unwrap();
        assert_eq!(inventory.runs(), ["web01"]);
    }

    #[test]
    fn test_crash_dump_mentions_item_and_params() {
        let context = CrashContext {
            host: "web01".into(),
            service: ServiceId::new("df", Some("/var".into())),
            description: "Filesystem /var".into(),
            parameters: Some(Parameters::from_iter([(
                "levels".to_string(),
                ParamValue::Tuple(vec![80.0.into(), 90.0.into()]),
            )])),
            is_enforced: true,
            error: "index out of range".into(),
        };
        let dump = TextCrashReporter.create_check_crash_dump(&context);

        assert!(dump.starts_with("check failed - please submit a crash report!"));
        assert!(dump.contains("Item: /var"));
        assert!(dump.contains("Parameters: {'levels': (80.0, 90.0)}"));
        assert!(dump.contains("Service is enforced"));
    }
}
