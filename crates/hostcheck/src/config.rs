//! Engine settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::plugin::types::State;

/// States used when summarizing a host run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitSpec {
    /// No service received any data
    pub empty_output: State,
    /// Some plugins received no data
    pub missing_sections: State,
    /// `(regex, state)` pairs overriding `missing_sections` for matching plugins
    pub specific_missing_sections: Vec<(String, State)>,
    /// A data source failed to deliver
    pub fetch_failure: State,
    /// A data source delivered output that could not be parsed cleanly
    pub parse_errors: State,
}

impl Default for ExitSpec {
    fn default() -> Self {
        Self {
            empty_output: State::Crit,
            missing_sections: State::Warn,
            specific_missing_sections: Vec::new(),
            fetch_failure: State::Crit,
            parse_errors: State::Warn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Raise plugin crashes and timeperiod errors instead of reporting them
    pub debug: bool,
    /// Services checked in parallel
    pub max_workers: usize,
    /// Time budget of a whole host run
    pub run_timeout_secs: u64,
    /// Add CPU and fetch timings to the host perfdata
    pub perfdata_with_times: bool,
    pub exit_spec: ExitSpec,
    /// Directory of the counter store files
    pub state_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debug: false,
            max_workers: 4,
            run_timeout_secs: 60,
            perfdata_with_times: true,
            exit_spec: ExitSpec::default(),
            state_dir: PathBuf::from("/var/lib/hostcheck/counters"),
        }
    }
}

impl EngineSettings {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Worker count, never zero
    pub fn workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: EngineSettings = serde_json::from_str(
            r#"{"max_workers": 0,
                "exit_spec": {"specific_missing_sections": [["^mgmt_", "UNKNOWN"]]}}"#,
        )
        .unwrap();

        assert_eq!(settings.workers(), 1);
        assert_eq!(settings.run_timeout(), Duration::from_secs(60));
        assert_eq!(settings.exit_spec.empty_output, State::Crit);
        assert_eq!(
            settings.exit_spec.specific_missing_sections,
            vec![("^mgmt_".to_string(), State::Unknown)]
        );

    }
}
