//! Builtin check plugins.

use std::sync::Arc;

use hostcheck::parameters::ConstantNamespace;
use hostcheck::plugin::{LegacyDiscovery, LegacyDiscoveryItem, LegacyItem};
use hostcheck::sections::SectionArgs;
use hostcheck::{
    check_fn, CheckError, CheckItem, CheckPlugin, CheckResult, LegacyAdapter, LegacyReturn, Metric,
    ParamValue, Parameters, PluginRegistry, State, StringTable, ValueStore,
};

const DF_DEFAULT_LEVELS: (f64, f64) = (80.0, 90.0);

fn first_table<'a>(sections: &'a SectionArgs, name: &str) -> &'a [Vec<String>] {
    sections.get(name).and_then(|table| table.as_deref()).map(Vec::as_slice).unwrap_or_default()
}

fn render_uptime(seconds: u64) -> String {
    let (days, rest) = (seconds / 86_400, seconds % 86_400);
    format!("Up since {days} days, {:02}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60)
}

/// `<<<uptime>>>`: seconds since boot
fn uptime() -> CheckPlugin {
    CheckPlugin::new(
        "uptime",
        check_fn(|args, _store| {
            let seconds = args
                .section("uptime")
                .and_then(|table| table.first())
                .and_then(|line| line.first())
                .and_then(|value| value.parse::<f64>().ok())
                .ok_or_else(|| CheckError::crashed("uptime section without a number"))?;

            let mut items: Vec<CheckItem> = vec![
                CheckResult::new(State::Ok, render_uptime(seconds as u64)).into(),
                Metric::new("uptime", seconds).into(),
            ];
            if let Some((warn, crit)) = args.params.and_then(|params| params.levels("min")) {
                let state = if seconds < crit {
                    State::Crit
                } else if seconds < warn {
                    State::Warn
                } else {
                    State::Ok
                };
                if state != State::Ok {
                    let text = format!("Rebooted recently (warn/crit below {warn}/{crit} s)");
                    items.push(CheckResult::new(state, text).into());
                }
            }
            Ok(items)
        }),
    )
    .with_default_parameters(Parameters::default())
}

/// `<<<kernel>>>`: a timestamp line followed by `<counter> <value>` lines
fn kernel() -> CheckPlugin {
    const COUNTERS: [(&str, &str); 3] = [
        ("ctxt", "Context switches"),
        ("processes", "Process creations"),
        ("pgmajfault", "Major page faults"),
    ];

    fn check(table: &StringTable, store: &mut ValueStore) -> Result<Vec<CheckItem>, CheckError> {
        let now: f64 = table
            .first()
            .and_then(|line| line.first())
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| CheckError::crashed("kernel section without a timestamp"))?;

        let mut items = Vec::new();
        let mut initializing = Vec::new();
        for (counter, label) in COUNTERS {
            let Some(value) = table
                .iter()
                .skip(1)
                .find(|line| line.first().map(String::as_str) == Some(counter))
                .and_then(|line| line.get(1)?.parse::<f64>().ok())
            else {
                continue;
            };
            match store.get_rate(counter, now, value, true) {
                Ok(rate) => {
                    items.push(CheckResult::new(State::Ok, format!("{label}: {rate:.2}/s")).into());
                    items.push(Metric::new(counter, rate).into());
                }
                Err(CheckError::IgnoreResults(_)) => initializing.push(counter),
                Err(err) => return Err(err),
            }
        }
        // all counters seen before the first rate is reported
        if !initializing.is_empty() {
            return Err(CheckError::ignore(format!("Initialized: {}", initializing.join(", "))));
        }
        Ok(items)
    }

    CheckPlugin::new(
        "kernel",
        check_fn(|args, store| {
            let table = args
                .section("kernel")
                .ok_or_else(|| CheckError::crashed("kernel section missing"))?;
            check(table, store)
        }),
    )
}

fn df_levels(params: &ParamValue) -> (f64, f64) {
    let levels = match params {
        ParamValue::Map(map) => map.get("levels"),
        ParamValue::Tuple(_) => Some(params),
        _ => None,
    };
    match levels.and_then(ParamValue::as_sequence) {
        Some([warn, crit]) => (
            warn.as_f64().unwrap_or(DF_DEFAULT_LEVELS.0),
            crit.as_f64().unwrap_or(DF_DEFAULT_LEVELS.1),
        ),
        _ => DF_DEFAULT_LEVELS,
    }
}

/// `<<<df>>>`: `<mountpoint> <size_kb> <used_kb>`, checked with the old tuple
/// convention
fn df_check(
    item: Option<&str>,
    params: &ParamValue,
    sections: &SectionArgs,
    _store: &mut ValueStore,
) -> Result<LegacyReturn, CheckError> {
    let Some(line) =
        first_table(sections, "df").iter().find(|line| line.first().map(String::as_str) == item)
    else {
        return Ok(LegacyReturn::nothing());
    };
    let (Some(size), Some(used)) = (
        line.get(1).and_then(|value| value.parse::<f64>().ok()),
        line.get(2).and_then(|value| value.parse::<f64>().ok()),
    ) else {
        return Err(CheckError::InvalidOutput(format!("malformed df line {line:?}")));
    };
    if size <= 0.0 {
        return Ok(LegacyReturn::Value(ParamValue::Tuple(vec![
            ParamValue::Int(3),
            "Size of filesystem is zero".into(),
        ])));
    }

    let (warn, crit) = df_levels(params);
    let percent = used / size * 100.0;
    let state = if percent >= crit {
        2
    } else if percent >= warn {
        1
    } else {
        0
    };
    let metric = ParamValue::Tuple(vec![
        "fs_used_percent".into(),
        percent.into(),
        warn.into(),
        crit.into(),
        0.0.into(),
        100.0.into(),
    ]);
    Ok(LegacyReturn::Items(vec![
        LegacyItem::Raw(ParamValue::Tuple(vec![
            ParamValue::Int(state),
            format!("{percent:.1}% used ({:.2} of {:.2} GB)", used / 1048576.0, size / 1048576.0)
                .into(),
            ParamValue::List(vec![metric]),
        ])),
        LegacyItem::Raw(ParamValue::Tuple(vec![
            ParamValue::Int(0),
            format!("\nSize: {size} kB\nUsed: {used} kB\nLevels: {warn:.1}%/{crit:.1}%").into(),
        ])),
    ]))
}

fn df() -> CheckPlugin {
    let defaults = Parameters::from_iter([(
        "levels".to_string(),
        ParamValue::Tuple(vec![DF_DEFAULT_LEVELS.0.into(), DF_DEFAULT_LEVELS.1.into()]),
    )]);
    CheckPlugin::new("df", Arc::new(LegacyAdapter::new(df_check))).with_default_parameters(defaults)
}

/// One `(mountpoint, "df_default_levels")` per df line
pub fn df_discovery() -> LegacyDiscovery {
    let mut constants = ConstantNamespace::new();
    constants.insert(
        "df_default_levels".into(),
        ParamValue::Tuple(vec![DF_DEFAULT_LEVELS.0.into(), DF_DEFAULT_LEVELS.1.into()]),
    );
    LegacyDiscovery::new(
        |sections| {
            first_table(sections, "df")
                .iter()
                .filter_map(|line| line.first())
                .map(|mountpoint| {
                    LegacyDiscoveryItem::Raw(ParamValue::Tuple(vec![
                        mountpoint.as_str().into(),
                        "df_default_levels".into(),
                    ]))
                })
                .collect()
        },
        constants,
    )
}

pub fn registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(uptime()).register(kernel()).register(df());
    registry
}

/// Plugins with a discovery function, keyed by plugin name
pub fn discoveries() -> Vec<(&'static str, LegacyDiscovery)> {
    vec![("df", df_discovery())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostcheck::plugin::DiscoveryEntry;
    use hostcheck::{CheckArgs, CheckFunction};
    use std::collections::BTreeMap;

    fn sections(name: &str, lines: &[&str]) -> SectionArgs {
        let table: StringTable = lines
            .iter()
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .collect();
        BTreeMap::from([(name.to_string(), Some(Arc::new(table)))])
    }

    fn run(
        plugin: &CheckPlugin,
        item: Option<&str>,
        sections: &SectionArgs,
        store: &mut ValueStore,
    ) -> Vec<Result<CheckItem, CheckError>> {
        let params = plugin.default_parameters.clone();
        let nodes = Vec::new();
        let args = CheckArgs { item, params: params.as_ref(), sections, nodes: &nodes };
        plugin.check.check(args, store).collect()
    }

    #[test]
    fn test_uptime() {
        let items = run(&uptime(), None, &sections("uptime", &["93784.5"]), &mut ValueStore::new());
        let Ok(CheckItem::Result(result)) = &items[0] else { panic!("expected a result") };
        assert_eq!(result.summary, "Up since 1 days, 02:03:04");
    }

    #[test]
    fn test_kernel_rates() {
        let plugin = kernel();
        let mut store = ValueStore::new();

        let table = sections("kernel", &["100", "ctxt 1000", "processes 10"]);
        let first = run(&plugin, None, &table, &mut store);
        assert!(matches!(
            &first[0],
            Err(CheckError::IgnoreResults(message)) if message == "Initialized: ctxt, processes"
        ));

        let table = sections("kernel", &["110", "ctxt 2000", "processes 30"]);
        let second = run(&plugin, None, &table, &mut store);
        let summaries: Vec<String> = second
            .iter()
            .filter_map(|item| match item {
                Ok(CheckItem::Result(result)) => Some(result.summary.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(summaries, ["Context switches: 100.00/s", "Process creations: 2.00/s"]);
    }

    #[test]
    fn test_df_levels() {
        let table = sections("df", &["/ 1000 850", "/boot 1000 100", "/empty 0 0"]);
        let plugin = df();

        let root = run(&plugin, Some("/"), &table, &mut ValueStore::new());
        let Ok(CheckItem::Result(result)) = &root[0] else { panic!("expected a result") };
        assert_eq!(result.state, State::Warn);
        assert!(result.summary.starts_with("85.0% used"));
        assert!(matches!(
            &root[1],
            Ok(CheckItem::Metric(metric)) if metric.name == "fs_used_percent"
        ));

        assert_eq!(df_levels(&ParamValue::Tuple(vec![50.0.into(), 60.0.into()])), (50.0, 60.0));
        assert_eq!(df_levels(&ParamValue::None), DF_DEFAULT_LEVELS);

        let empty = run(&plugin, Some("/empty"), &table, &mut ValueStore::new());
        assert!(matches!(
            &empty[0],
            Ok(CheckItem::Result(result)) if result.state == State::Unknown
        ));

        assert!(run(&plugin, Some("/gone"), &table, &mut ValueStore::new()).is_empty());
    }

    #[test]
    fn test_df_discovery() {
        let table = sections("df", &["/ 1000 850", "/boot 1000 100"]);
        let entries = df_discovery().discover(&table).unwrap();

        let items: Vec<Option<String>> = entries
            .into_iter()
            .map(|entry| match entry {
                DiscoveryEntry::Service(service) => service.item,
                DiscoveryEntry::Unrecognized(raw) => panic!("unexpected {raw}"),
            })
            .collect();
        assert_eq!(items, [Some("/".to_string()), Some("/boot".to_string())]);
    }
}
