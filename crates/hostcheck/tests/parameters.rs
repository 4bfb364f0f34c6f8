use std::collections::BTreeMap;

use hostcheck::parameters::merge;
use hostcheck::{
    ParamValue, ParameterError, StaticTimeperiods, TimeperiodError, TimespecificParameterSet,
    TimespecificParameters,
};

fn map(entries: &[(&str, ParamValue)]) -> ParamValue {
    ParamValue::Map(
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn pair(a: i64, b: i64) -> ParamValue {
    ParamValue::Tuple(vec![ParamValue::Int(a), ParamValue::Int(b)])
}

#[test]
fn no_active_timeperiod_yields_default() {
    let set = TimespecificParameterSet::new(
        map(&[("levels", pair(80, 90))]),
        vec![
            ("night".into(), map(&[("levels", pair(95, 99))])),
            ("weekend".into(), map(&[("x", ParamValue::Int(1))])),
        ],
    );

    let evaluated = set.evaluate(&StaticTimeperiods::default(), false).unwrap();
    assert_eq!(evaluated, set.default);
}

#[test]
fn first_listed_active_timeperiod_wins() {
    let set = TimespecificParameterSet::new(
        map(&[("levels", pair(80, 90))]),
        vec![
            ("night".into(), map(&[("levels", pair(95, 99))])),
            ("weekend".into(), map(&[("levels", pair(1, 2))])),
        ],
    );

    let evaluated = set.evaluate(&StaticTimeperiods::new(["weekend", "night"]), false).unwrap();
    assert_eq!(evaluated, map(&[("levels", pair(95, 99))]));
}

#[test]
fn earlier_rule_keeps_its_keys() {
    let specific = TimespecificParameterSet::constant(map(&[("levels", pair(80, 90))]));
    let general = TimespecificParameterSet::new(
        map(&[("levels", pair(10, 20)), ("average", ParamValue::Int(15))]),
        vec![("night".into(), map(&[("levels", pair(1, 2)), ("magic", ParamValue::Float(0.8))]))],
    );
    let params = TimespecificParameters::new(vec![specific, general]);

    let evaluated = params.evaluate(&StaticTimeperiods::new(["night"]), false).unwrap();
    assert_eq!(
        evaluated,
        map(&[
            ("levels", pair(80, 90)),
            ("magic", ParamValue::Float(0.8)),
            ("average", ParamValue::Int(15)),
        ])
    );
    assert!(!params.is_constant());
    assert_eq!(
        params.preview(),
        map(&[("levels", pair(80, 90)), ("average", ParamValue::Int(15))])
    );
}

#[test]
fn non_mapping_values_take_first_block() {
    assert_eq!(merge(&[pair(1, 1), pair(2, 2)], &ParamValue::empty_map()), pair(1, 1));
    assert_eq!(merge(&[], &pair(3, 3)), pair(3, 3));
}

#[test]
fn oracle_failure_skips_or_surfaces() {
    let set = TimespecificParameterSet::new(
        map(&[("levels", pair(80, 90))]),
        vec![
            ("broken".into(), map(&[("levels", pair(1, 2))])),
            ("night".into(), map(&[("x", ParamValue::Int(1))])),
        ],
    );
    let oracle = |name: &str| -> Result<bool, TimeperiodError> {
        if name == "broken" {
            Err(TimeperiodError::new(name, "unknown timeperiod"))
        } else {
            Ok(true)
        }
    };


    let lenient = set.evaluate(&oracle, false).unwrap();
    assert_eq!(lenient, map(&[("levels", pair(80, 90)), ("x", ParamValue::Int(1))]));

    let strict = set.evaluate(&oracle, true);
    assert!(matches!(strict, Err(ParameterError::Timeperiod(err)) if err.name == "broken"));
}
