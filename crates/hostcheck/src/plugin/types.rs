//! Item types emitted by check functions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monitoring state of a (sub)result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    Ok,
    Warn,
    Crit,
    Unknown,
}

impl State {
    /// Numeric state code as used by monitoring cores
    pub fn code(self) -> u8 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Crit => 2,
            State::Unknown => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(State::Ok),
            1 => Some(State::Warn),
            2 => Some(State::Crit),
            3 => Some(State::Unknown),
            _ => None,
        }
    }

    /// Rank in severity order OK < WARN < UNKNOWN < CRIT
    ///
    /// Differs from the numeric code: UNKNOWN is less severe than CRIT.
    pub fn severity(self) -> u8 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Unknown => 2,
            State::Crit => 3,
        }
    }

    /// The more severe of two states
    pub fn worse(self, other: State) -> State {
        if other.severity() > self.severity() { other } else { self }
    }

    /// Most severe state of all given states, OK for none
    pub fn worst(states: impl IntoIterator<Item = State>) -> State {
        states.into_iter().fold(State::Ok, State::worse)
    }

    /// Marker appended to texts when several results are combined
    pub fn marker(self) -> &'static str {
        match self {
            State::Ok => "",
            State::Warn => "(!)",
            State::Crit => "(!!)",
            State::Unknown => "(?)",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            State::Ok => "OK",
            State::Warn => "WARN",
            State::Crit => "CRIT",
            State::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One verdict of a check function: a state plus texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub state: State,

    /// Short single-line text, may be empty
    pub summary: String,

    /// Long text, may span multiple lines
    pub details: String,
}

impl CheckResult {
    /// Result whose details repeat the summary
    ///
    /// Only the first line of a multi-line text becomes the summary; the full
    /// text goes to the details.
    pub fn new(state: State, text: impl Into<String>) -> Self {
        let text = text.into();
        let summary = text.lines().next().unwrap_or_default().trim().to_string();
        Self { state, summary, details: text.trim().to_string() }
    }

    pub fn with_details(
        state: State,
        summary: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {

        let summary = summary.into();
        let summary = summary.lines().next().unwrap_or_default().trim().to_string();
        Self { state, summary, details: details.into() }
    }

    /// Text that only shows up in the details, unless the state is not OK
    pub fn notice(state: State, text: impl Into<String>) -> Self {
        let text = text.into();
        let summary = if state == State::Ok {
            String::new()
        } else {
            text.lines().next().unwrap_or_default().trim().to_string()
        };
        Self { state, summary, details: text.trim().to_string() }
    }
}

/// A numeric measurement with optional levels and boundaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub levels: (Option<f64>, Option<f64>),
    pub boundaries: (Option<f64>, Option<f64>),
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value, levels: (None, None), boundaries: (None, None) }
    }

    pub fn with_levels(mut self, warn: Option<f64>, crit: Option<f64>) -> Self {
        self.levels = (warn, crit);
        self
    }

    pub fn with_boundaries(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.boundaries = (min, max);
        self
    }
}

fn perf_value(value: Option<f64>) -> String {
    match value {
        Some(v) => {
            let text = format!("{v:.6}");
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        None => String::new(),
    }
}

/// Performance data notation `name=value;warn;crit;min;max`
impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            perf_value(Some(self.value)),
            perf_value(self.levels.0),
            perf_value(self.levels.1),
            perf_value(self.boundaries.0),
            perf_value(self.boundaries.1),
        ];
        let used = fields.iter().rposition(|field| !field.is_empty()).unwrap_or(0) + 1;
        write!(f, "{}={}", self.name, fields[..used].join(";"))
    }
}

/// "No verdict available" marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnoreResults(pub String);

impl IgnoreResults {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for IgnoreResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One element of a check function's output stream
#[derive(Debug, Clone, PartialEq)]
pub enum CheckItem {
    Result(CheckResult),
    Metric(Metric),
    Ignore(IgnoreResults),
}

impl From<CheckResult> for CheckItem {
    fn from(result: CheckResult) -> Self {
        CheckItem::Result(result)
    }
}

impl From<Metric> for CheckItem {
    fn from(metric: Metric) -> Self {
        CheckItem::Metric(metric)
    }
}

impl From<IgnoreResults> for CheckItem {
    fn from(ignore: IgnoreResults) -> Self {
        CheckItem::Ignore(ignore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_differs_from_codes() {
        assert_eq!(State::worst([State::Ok, State::Unknown]), State::Unknown);
        assert_eq!(State::worst([State::Crit, State::Unknown]), State::Crit);
        assert_eq!(State::worst([]), State::Ok);
        assert!(State::Unknown.code() > State::Crit.code());
    }

    #[test]
    fn test_result_multiline_text() {
        let result = CheckResult::new(State::Warn, "first\nsecond");
        assert_eq!(result.summary, "first");
        assert_eq!(result.details, "first\nsecond");
    }

    #[test]
    fn test_notice_hidden_when_ok() {
        assert_eq!(CheckResult::notice(State::Ok, "quiet").summary, "");
        assert_eq!(CheckResult::notice(State::Crit, "loud").summary, "loud");
    }

    #[test]
    fn test_metric_perfdata() {
        let metric = Metric::new("fs_used", 12.5).with_levels(Some(80.0), Some(90.0));
        assert_eq!(metric.to_string(), "fs_used=12.5;80;90");
        assert_eq!(Metric::new("load", 0.0).to_string(), "load=0");
        assert_eq!(Metric::new("x", 1.0).with_boundaries(None, Some(2.0)).to_string(), "x=1;;;;2");
    }
}
