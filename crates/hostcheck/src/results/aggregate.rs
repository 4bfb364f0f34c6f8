use serde::Serialize;

use super::consumer::ConsumedItems;
use crate::plugin::types::{CheckResult, Metric, State};

/// Final state, text and metrics of one service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCheckResult {
    pub state: State,
    pub output: String,
    pub metrics: Vec<Metric>,
}

impl ServiceCheckResult {
    pub fn new(state: State, output: impl Into<String>, metrics: Vec<Metric>) -> Self {
        Self { state, output: output.into(), metrics }
    }

    /// The check ran but produced no result at all
    pub fn item_not_found() -> Self {
        Self::new(State::Unknown, "Item not found in monitoring data", Vec::new())
    }

    pub fn received_no_data() -> Self {
        Self::new(State::Unknown, "Check plugin received no monitoring data", Vec::new())
    }

    pub fn cluster_received_no_data(nodes: &[String]) -> Self {
        Self::new(
            State::Unknown,
            format!(
                "Clustered service received no monitoring data (configured nodes: {})",
                nodes.join(", ")
            ),
            Vec::new(),
        )
    }

    pub fn check_not_implemented() -> Self {
        Self::new(State::Unknown, "Check plugin not implemented", Vec::new())
    }

    /// Outcome of a check that asked to ignore its results
    pub fn ignored(message: &str) -> Self {
        let output = if message.is_empty() { "No service summary available" } else { message };
        Self::new(State::Ok, output, Vec::new())
    }
}

fn with_marker(text: &str, marker: &str) -> String {
    if marker.is_empty() || text.contains(marker) {
        text.to_string()
    } else {
        format!("{text}{marker}")
    }
}

/// Reduce the results of a check to one service result
///
/// The state is the worst of all results. Summaries are joined on the first
/// line, details follow on their own lines. With more than one result every
/// text gets its state marker and every details text is kept, so each result
/// can be told apart in the long output.
pub fn aggregate_results(consumed: ConsumedItems) -> ServiceCheckResult {
    let ConsumedItems { results, metrics } = consumed;
    if results.is_empty() {
        return ServiceCheckResult::item_not_found();
    }

    let state = State::worst(results.iter().map(|result| result.state));
    let needs_marker = results.len() > 1;
    let mut summaries = Vec::new();
    let mut details = Vec::new();

    for CheckResult { state, summary, details: long } in &results {
        let marker = if needs_marker { state.marker() } else { "" };
        if !summary.is_empty() {
            summaries.push(with_marker(summary, marker));
        }
        // a lone result's details repeating its summary add nothing
        if !long.is_empty() && (needs_marker || long != summary) {
            details.push(with_marker(long, marker));
        }
    }

    if summaries.is_empty() {
        let count = results.len();
        summaries.push(format!(
            "Everything looks OK - {count} detail{} available",
            if count == 1 { "" } else { "s" }
        ));
    }

    let mut lines = vec![summaries.join(", ")];
    lines.extend(details);
    ServiceCheckResult::new(state, lines.join("\n"), metrics)
}
