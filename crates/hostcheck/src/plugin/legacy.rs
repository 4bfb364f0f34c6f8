//! Adapter running old style check functions.
//!
//! Legacy checks return `(state, text[, metrics])` tuples instead of typed
//! items. The adapter converts them into the regular item stream so the
//! executor never needs to know which convention a plugin follows.

use std::collections::BTreeMap;

use super::registry::{CheckArgs, CheckFunction, CheckStream};
use super::types::{CheckItem, CheckResult, Metric, State};
use crate::error::CheckError;
use crate::parameters::ParamValue;
use crate::sections::SectionArgs;
use crate::store::ValueStore;

/// One element returned by a legacy check
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyItem {
    /// Already a typed item; passed through unchanged
    Typed(CheckItem),
    /// A `(state, text[, metrics])` tuple
    Raw(ParamValue),
}

/// Whatever a legacy check function returned
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyReturn {
    /// A plain value: `None`, one tuple, or a list of tuples
    Value(ParamValue),
    /// Items produced one by one
    Items(Vec<LegacyItem>),
}

impl LegacyReturn {
    pub fn nothing() -> Self {
        LegacyReturn::Value(ParamValue::None)
    }

    fn into_items(self) -> Result<Vec<LegacyItem>, CheckError> {
        match self {
            LegacyReturn::Items(items) => Ok(items),
            LegacyReturn::Value(ParamValue::None) => Ok(Vec::new()),
            LegacyReturn::Value(tuple @ ParamValue::Tuple(_)) => Ok(vec![LegacyItem::Raw(tuple)]),
            LegacyReturn::Value(ParamValue::List(items)) => {
                Ok(items.into_iter().map(LegacyItem::Raw).collect())
            }
            LegacyReturn::Value(other) => Err(CheckError::InvalidOutput(format!(
                "legacy check returned {} instead of a tuple or a list",
                other.type_name()
            ))),
        }
    }
}

/// Parse a number that may carry a unit suffix
///
/// Tries the whole string first, then drops trailing characters one by one.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let mut ends: Vec<usize> = text.char_indices().map(|(idx, _)| idx).skip(1).collect();
    ends.push(text.len());
    ends.iter().rev().find_map(|&end| text[..end].parse::<f64>().ok())
}

fn metric_number(value: &ParamValue) -> Option<f64> {
    match value {
        ParamValue::Str(text) => parse_number(text),
        other => other.as_f64(),
    }
}

/// Convert a `(name, value, warn, crit, min, max)` tuple; unparsable values drop the metric
fn convert_metric(raw: &ParamValue) -> Result<Option<Metric>, CheckError> {
    let fields = raw
        .as_sequence()
        .filter(|fields| (2..=6).contains(&fields.len()))
        .ok_or_else(|| CheckError::InvalidOutput(format!("invalid metric {raw}")))?;
    let name = fields[0]
        .as_str()
        .ok_or_else(|| CheckError::InvalidOutput(format!("invalid metric name in {raw}")))?;
    let Some(value) = metric_number(&fields[1]) else {
        return Ok(None);
    };
    let optional = |idx: usize| fields.get(idx).and_then(metric_number);
    Ok(Some(
        Metric::new(name, value)
            .with_levels(optional(2), optional(3))
            .with_boundaries(optional(4), optional(5)),
    ))
}

struct LegacyTuple {
    state: State,
    text: String,
    metrics: Vec<Metric>,
}

fn convert_tuple(raw: &ParamValue) -> Result<LegacyTuple, CheckError> {
    let invalid =
        || CheckError::InvalidOutput(format!("expected (state, text[, metrics]), got {raw}"));
    let (state, text, metrics) = match raw {
        ParamValue::Tuple(fields) => match fields.as_slice() {
            [state, text] => (state, text, None),
            [state, text, metrics] => (state, text, Some(metrics)),
            _ => return Err(invalid()),
        },
        _ => return Err(invalid()),
    };
    let state = state.as_i64().and_then(State::from_code).ok_or_else(invalid)?;
    let text = text.as_str().ok_or_else(invalid)?.to_string();
    let metrics = match metrics {
        None => Vec::new(),
        Some(metrics) => {
            let raw_metrics = metrics.as_sequence().ok_or_else(invalid)?;
            let mut converted = Vec::with_capacity(raw_metrics.len());
            for metric in raw_metrics {
                converted.extend(convert_metric(metric)?);
            }
            converted
        }
    };
    Ok(LegacyTuple { state, text, metrics })
}

fn pluralize(count: usize, word: &str) -> String {
    if count == 1 { format!("{count} {word}") } else { format!("{count} {word}s") }
}

/// Tuples collected after the first multi-line text, grouped by state
#[derive(Default)]
struct Consolidation {
    order: Vec<State>,
    groups: BTreeMap<u8, Vec<LegacyTuple>>,
}

impl Consolidation {
    fn push(&mut self, tuple: LegacyTuple) {
        let key = tuple.state.code();
        if !self.groups.contains_key(&key) {
            self.order.push(tuple.state);
        }
        self.groups.entry(key).or_default().push(tuple);
    }

    fn into_items(mut self) -> Vec<CheckItem> {
        let mut items = Vec::new();
        for (idx, state) in self.order.iter().enumerate() {
            let Some(group) = self.groups.remove(&state.code()) else {
                continue;
            };
            let lines: Vec<&str> = group
                .iter()
                .flat_map(|tuple| tuple.text.lines())
                .map(str::trim_start)
                .filter(|line| !line.trim().is_empty())
                .collect();
            let first_line = group
                .first()
                .and_then(|tuple| tuple.text.lines().next())
                .map(str::trim)
                .unwrap_or_default();
            let summary = if idx == 0 && !first_line.is_empty() {
                first_line.to_string()
            } else {
                format!("{} available", pluralize(lines.len(), "additional detail"))
            };
            items.push(CheckResult::with_details(*state, summary, lines.join("\n")).into());
            items.extend(group.into_iter().flat_map(|tuple| tuple.metrics).map(CheckItem::Metric));
        }
        items
    }
}

/// Normalize a legacy return value into typed items
pub fn convert_legacy_return(value: LegacyReturn) -> Result<Vec<CheckItem>, CheckError> {
    let mut items = Vec::new();
    let mut consolidation: Option<Consolidation> = None;

    for item in value.into_items()? {
        let raw = match item {
            LegacyItem::Typed(typed) => {
                items.push(typed);
                continue;
            }
            LegacyItem::Raw(raw) => raw,
        };
        let tuple = convert_tuple(&raw)?;
        if consolidation.is_none() && tuple.text.contains('\n') {
            consolidation = Some(Consolidation::default());
        }
        match consolidation.as_mut() {
            Some(groups) => groups.push(tuple),
            None => {
                items.push(CheckResult::new(tuple.state, tuple.text).into());
                items.extend(tuple.metrics.into_iter().map(CheckItem::Metric));
            }
        }
    }

    if let Some(groups) = consolidation {
        items.extend(groups.into_items());
    }
    Ok(items)
}

/// Signature of a legacy check: item, unwrapped parameters, sections, counters
pub type LegacyCheckFn = dyn Fn(
        Option<&str>,
        &ParamValue,
        &SectionArgs,
        &mut ValueStore,
    ) -> Result<LegacyReturn, CheckError>
    + Send
    + Sync;

/// Runs a legacy check function behind the regular check interface
pub struct LegacyAdapter {
    function: Box<LegacyCheckFn>,
}

impl LegacyAdapter {
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(
                Option<&str>,
                &ParamValue,
                &SectionArgs,
                &mut ValueStore,
            ) -> Result<LegacyReturn, CheckError>
            + Send
            + Sync
            + 'static,
    {
        Self { function: Box::new(function) }
    }
}

impl CheckFunction for LegacyAdapter {
    fn check<'a>(&'a self, args: CheckArgs<'a>, store: &'a mut ValueStore) -> CheckStream<'a> {
        let params = args.params.map(|params| params.unwrap_legacy()).unwrap_or(ParamValue::None);
        let converted = (self.function)(args.item, &params, args.sections, store)
            .and_then(convert_legacy_return);
        match converted {
            Ok(items) => Box::new(items.into_iter().map(Ok)),
            Err(err) => Box::new(std::iter::once(Err(err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Parameters;
    use crate::plugin::registry::NodeSections;

    fn tuple(items: Vec<ParamValue>) -> ParamValue {
        ParamValue::Tuple(items)
    }

    fn legacy(state: i64, text: &str) -> ParamValue {
        tuple(vec![state.into(), text.into()])
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12.3s"), Some(12.3));
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number(" 7.5MB "), Some(7.5));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_return_shapes() {
        assert!(convert_legacy_return(LegacyReturn::nothing()).unwrap().is_empty());
        assert_eq!(convert_legacy_return(LegacyReturn::Value(legacy(1, "high"))).unwrap().len(), 1);
        let pair = ParamValue::List(vec![legacy(0, "a"), legacy(0, "b")]);
        assert_eq!(
            convert_legacy_return(LegacyReturn::Value(pair)).unwrap().len(),
            2

        );
        assert!(matches!(
            convert_legacy_return(LegacyReturn::Value(ParamValue::Int(3))),
            Err(CheckError::InvalidOutput(_))
        ));
        assert!(matches!(
            convert_legacy_return(LegacyReturn::Value(legacy(7, "bad state"))),
            Err(CheckError::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_metrics_with_units() {
        let raw = tuple(vec![
            0i64.into(),
            "fine".into(),
            ParamValue::List(vec![
                tuple(vec!["runtime".into(), "12.3s".into(), "20s".into(), "oops".into()]),
                tuple(vec!["broken".into(), "abc".into()]),
            ]),
        ]);
        let items = convert_legacy_return(LegacyReturn::Value(raw)).unwrap();

        assert_eq!(items.len(), 2);
        let metric = Metric::new("runtime", 12.3).with_levels(Some(20.0), None);
        assert_eq!(items[1], CheckItem::Metric(metric));
    }

    #[test]
    fn test_typed_items_pass_through() {
        let typed = CheckItem::Result(CheckResult::new(State::Warn, "typed"));
        let items = convert_legacy_return(LegacyReturn::Items(vec![
            LegacyItem::Typed(typed.clone()),
            LegacyItem::Raw(legacy(0, "raw")),
        ]))
        .unwrap();

        assert_eq!(items[0], typed);
        assert_eq!(items[1], CheckItem::Result(CheckResult::new(State::Ok, "raw")));
    }

    #[test]
    fn test_detail_consolidation() {
        let items = convert_legacy_return(LegacyReturn::Value(ParamValue::List(vec![
            legacy(0, "before"),
            legacy(0, "Summary line\n  detail one"),
            legacy(2, "broken thing"),
            legacy(0, "\n   detail two"),
        ])))
        .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0], CheckItem::Result(CheckResult::new(State::Ok, "before")));
        assert_eq!(
            items[1],
            CheckItem::Result(CheckResult::with_details(
                State::Ok,
                "Summary line",
                "Summary line\ndetail one\ndetail two"
            ))
        );
        assert_eq!(
            items[2],
            CheckItem::Result(CheckResult::with_details(
                State::Crit,
                "1 additional detail available",
                "broken thing"
            ))
        );
    }

    #[test]
    fn test_adapter_unwraps_parameters() {
        let adapter = LegacyAdapter::new(|item, params, _sections, _store| {
            Ok(LegacyReturn::Value(legacy(0, &format!("{} {}", item.unwrap_or("-"), params))))
        });
        let params = Parameters::wrap(tuple(vec![80i64.into(), 90i64.into()]));
        let sections = SectionArgs::new();
        let nodes = NodeSections::new();
        let args = CheckArgs {
            item: Some("/"),
            params: Some(&params),
            sections: &sections,
            nodes: &nodes,
        };


        let mut store = ValueStore::new();

        let items: Vec<_> = adapter.check(args, &mut store).collect::<Result<_, _>>().unwrap();
        assert_eq!(items, vec![CheckItem::Result(CheckResult::new(State::Ok, "/ (80, 90)"))]);
    }
}
