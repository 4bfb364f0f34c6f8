//! Host level classification of services that received no data.

use regex::Regex;
use std::collections::BTreeSet;
use tracing::warn;

use crate::config::ExitSpec;
use crate::executor::AggregatedResult;
use crate::plugin::types::{CheckResult, State};

/// Results describing plugins that got no monitoring data
///
/// Nothing is reported when every service received data. When no service
/// did, a single result at `empty_output` says so. Otherwise plugins matching
/// one of the `specific_missing_sections` patterns are reported on their own
/// at that pattern's state, the rest together at `missing_sections`.
pub fn check_plugins_missing_data(
    outcomes: &[AggregatedResult],
    exit_spec: &ExitSpec,
) -> Vec<CheckResult> {
    let missing: BTreeSet<&str> = outcomes
        .iter()
        .filter(|outcome| !outcome.data_received)
        .map(|outcome| outcome.service.plugin.as_str())
        .collect();
    if missing.is_empty() {
        return Vec::new();
    }
    if !outcomes.iter().any(|outcome| outcome.data_received) {
        return vec![CheckResult::new(exit_spec.empty_output, "Got no information from host")];
    }

    let patterns: Vec<(Regex, State)> = exit_spec
        .specific_missing_sections
        .iter()
        .filter_map(|(pattern, state)| match Regex::new(&format!("^(?:{pattern})")) {
            Ok(regex) => Some((regex, *state)),
            Err(err) => {
                warn!("Ignoring invalid missing sections pattern '{}': {}", pattern, err);
                None
            }
        })
        .collect();

    let mut generic = Vec::new();
    let mut specific = Vec::new();
    for plugin in missing {
        match patterns.iter().find(|(regex, _)| regex.is_match(plugin)) {
            Some((_, state)) => specific.push(CheckResult::new(*state, plugin)),
            None => generic.push(plugin),
        }
    }

    let mut results = Vec::with_capacity(specific.len() + 1);
    if !generic.is_empty() {
        results.push(CheckResult::new(
            exit_spec.missing_sections,
            format!("Missing monitoring data for check plugins: {}", generic.join(", ")),
        ));
    }
    results.extend(specific);
    results
}
