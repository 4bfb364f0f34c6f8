//! Time-specific parameter rules and their resolution against a timeperiod oracle.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::merge::merge;
use super::value::ParamValue;
use crate::collaborators::TimeperiodOracle;
use crate::error::ParameterError;

/// One rule: a default block plus ordered timeperiod overrides
///
/// The first listed timeperiod wins among those active at the same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimespecificParameterSet {
    pub default: ParamValue,
    #[serde(default, rename = "timeperiods")]
    pub timeperiod_values: Vec<(String, ParamValue)>,
}

impl TimespecificParameterSet {
    pub fn new(default: ParamValue, timeperiod_values: Vec<(String, ParamValue)>) -> Self {
        Self { default, timeperiod_values }
    }

    /// A rule without any timeperiod overrides
    pub fn constant(default: ParamValue) -> Self {
        Self::new(default, Vec::new())
    }

    pub fn is_constant(&self) -> bool {
        self.timeperiod_values.is_empty()
    }

    /// Resolve the rule for the current point in time
    ///
    /// A timeperiod the oracle cannot answer for contributes nothing, unless
    /// `surface_errors` is set.
    pub fn evaluate(
        &self,
        oracle: &dyn TimeperiodOracle,
        surface_errors: bool,
    ) -> Result<ParamValue, ParameterError> {
        let mut active = Vec::new();
        for (timeperiod, value) in &self.timeperiod_values {
            match oracle.is_active(timeperiod) {
                Ok(true) => active.push(value.clone()),
                Ok(false) => {}
                Err(err) if surface_errors => return Err(ParameterError::Timeperiod(err)),
                Err(err) => {
                    warn!("Ignoring timeperiod {} while resolving parameters: {}", timeperiod, err);
                }
            }
        }
        Ok(merge(&active, &self.default))
    }
}

/// Ordered parameter rules, most specific first
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimespecificParameters(pub Vec<TimespecificParameterSet>);

impl TimespecificParameters {
    pub fn new(sets: Vec<TimespecificParameterSet>) -> Self {
        Self(sets)
    }

    /// Single constant rule
    pub fn constant(value: ParamValue) -> Self {
        Self(vec![TimespecificParameterSet::constant(value)])
    }

    /// True when no rule depends on a timeperiod
    pub fn is_constant(&self) -> bool {
        self.0.iter().all(TimespecificParameterSet::is_constant)
    }

    /// Evaluate every rule and merge the results in rule order
    ///
    /// A later rule can add keys, never replace one an earlier rule defines,
    /// even when the earlier value is only that rule's default.
    pub fn evaluate(
        &self,
        oracle: &dyn TimeperiodOracle,
        surface_errors: bool,
    ) -> Result<ParamValue, ParameterError> {
        let evaluated = self
            .0
            .iter()
            .map(|set| set.evaluate(oracle, surface_errors))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(merge(&evaluated, &ParamValue::empty_map()))
    }

    /// Evaluate as if no timeperiod were active, without consulting any oracle
    pub fn preview(&self) -> ParamValue {
        let defaults: Vec<ParamValue> = self.0.iter().map(|set| set.default.clone()).collect();
        merge(&defaults, &ParamValue::empty_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{StaticTimeperiods, TimeperiodError};
    use std::collections::BTreeMap;

    fn map(entries: &[(&str, i64)]) -> ParamValue {
        ParamValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), ParamValue::Int(*v)))
                .collect::<BTreeMap<_, _>>(),
        )

    }

    #[test]
    fn test_no_active_timeperiod_yields_default() {
        let set = TimespecificParameterSet::new(
            map(&[("a", 1)]),
            vec![("night".into(), map(&[("a", 2)]))],
        );
        let oracle = StaticTimeperiods::new(Vec::<String>::new());

        assert_eq!(set.evaluate(&oracle, false).unwrap(), map(&[("a", 1)]));
    }

    #[test]
    fn test_first_listed_active_timeperiod_wins() {
        let set = TimespecificParameterSet::new(
            map(&[("a", 0), ("b", 0)]),
            vec![
                ("night".into(), map(&[("a", 1)])),
                ("weekend".into(), map(&[("a", 2), ("b", 2)])),
            ],
        );
        let oracle = StaticTimeperiods::new(["night", "weekend"]);

        assert_eq!(set.evaluate(&oracle, false).unwrap(), map(&[("a", 1), ("b", 2)]));
    }

    #[test]
    fn test_oracle_failure_skips_timeperiod() {
        let set = TimespecificParameterSet::new(
            map(&[("a", 0)]),
            vec![("broken".into(), map(&[("a", 9)])), ("day".into(), map(&[("a", 1)]))],
        );
        let oracle = |name: &str| -> Result<bool, TimeperiodError> {
            if name == "broken" {
                Err(TimeperiodError::new(name, "core unreachable"))
            } else {
                Ok(true)
            }
        };

        assert_eq!(set.evaluate(&oracle, false).unwrap(), map(&[("a", 1)]));
        assert!(matches!(set.evaluate(&oracle, true), Err(ParameterError::Timeperiod(_))));
    }

    #[test]
    fn test_earlier_default_shadows_later_timeperiod_value() {
        let params = TimespecificParameters::new(vec![
            TimespecificParameterSet::constant(map(&[("k", 1)])),
            TimespecificParameterSet::new(
                map(&[("k", 2), ("other", 2)]),
                vec![("day".into(), map(&[("k", 3)]))],
            ),
        ]);
        let oracle = StaticTimeperiods::new(["day"]);

        assert_eq!(params.evaluate(&oracle, false).unwrap(), map(&[("k", 1), ("other", 2)]));
        assert!(!params.is_constant());
    }

    #[test]
    fn test_preview_uses_defaults_only() {
        let params = TimespecificParameters::new(vec![TimespecificParameterSet::new(
            map(&[("k", 1)]),
            vec![("day".into(), map(&[("k", 3)]))],
        )]);
        assert_eq!(params.preview(), map(&[("k", 1)]));
        assert!(TimespecificParameters::constant(map(&[])).is_constant());
    }
}
