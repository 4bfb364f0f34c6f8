//! Check functions for clustered services.

use std::sync::Arc;

use super::registry::{CheckArgs, CheckFunction, CheckPlugin, CheckStream, NodeSections};
use super::types::{CheckItem, CheckResult, State};
use crate::error::CheckError;
use crate::service::ClusterMode;
use crate::store::ValueStore;

/// Picks the check function used for a clustered service
pub trait ClusterDispatcher: Send + Sync {
    fn check_function(
        &self,
        mode: ClusterMode,
        plugin: &Arc<CheckPlugin>,
    ) -> Arc<dyn CheckFunction>;
}

/// Dispatcher implementing the built-in cluster modes
#[derive(Debug, Default)]
pub struct BuiltinClusterDispatcher;

impl ClusterDispatcher for BuiltinClusterDispatcher {
    fn check_function(
        &self,
        mode: ClusterMode,
        plugin: &Arc<CheckPlugin>,
    ) -> Arc<dyn CheckFunction> {
        Arc::new(ClusterCheck { mode, plugin: plugin.clone() })
    }
}

struct ClusterCheck {
    mode: ClusterMode,
    plugin: Arc<CheckPlugin>,
}

/// Items of one node's run, with node-prefixed result texts
struct NodeOutcome {
    node: String,
    state: State,
    items: Vec<CheckItem>,
}

fn node_prefixed(node: &str, text: String) -> String {
    if text.is_empty() { text } else { format!("[{node}]: {text}") }
}

impl ClusterCheck {
    /// Run the plugin on one node's sections
    ///
    /// Each node keeps its own namespace below the service's store, so
    /// counters of different nodes never mix.
    fn run_node(
        &self,
        args: &CheckArgs<'_>,
        node: &str,
        sections: &crate::sections::SectionArgs,
        store: &mut ValueStore,
    ) -> Result<NodeOutcome, CheckError> {
        let node_args =
            CheckArgs { item: args.item, params: args.params, sections, nodes: args.nodes };
        let namespace = format!("node:{node}");
        let mut node_store = store.nested(&namespace);
        let collected: Result<Vec<CheckItem>, CheckError> =
            self.plugin.check.check(node_args, &mut node_store).collect();
        store.set_nested(namespace, node_store);

        let items: Vec<CheckItem> = collected?
            .into_iter()
            .map(|item| match item {
                CheckItem::Result(result) => CheckItem::Result(CheckResult {
                    state: result.state,
                    summary: node_prefixed(node, result.summary),
                    details: node_prefixed(node, result.details),
                }),
                other => other,
            })
            .collect();
        let state = State::worst(items.iter().filter_map(|item| match item {
            CheckItem::Result(result) => Some(result.state),
            _ => None,
        }));
        Ok(NodeOutcome { node: node.to_string(), state, items })
    }

    fn native(
        &self,
        args: CheckArgs<'_>,
        store: &mut ValueStore,
    ) -> Vec<Result<CheckItem, CheckError>> {
        match &self.plugin.cluster_check {
            Some(check) => check.check(args, store).collect(),
            None => vec![Ok(CheckResult::new(
                State::Unknown,
                "This service does not implement a native cluster mode. \
                 Please change your configuration.",
            )
            .into())],
        }
    }

    fn failover(
        &self,
        args: CheckArgs<'_>,
        nodes: &NodeSections,
        store: &mut ValueStore,
    ) -> Result<Vec<CheckItem>, CheckError> {
        let Some((node, sections)) = nodes.first() else {
            return Ok(Vec::new());
        };
        let outcome = self.run_node(&args, node, sections, store)?;
        let mut items = outcome.items;
        if nodes.len() > 1 {
            let others: Vec<&str> = nodes[1..].iter().map(|(name, _)| name.as_str()).collect();
            items.push(
                CheckResult::new(
                    State::Warn,
                    format!("Service found on more than one node, also on: {}", others.join(", ")),
                )
                .into(),
            );
        } else {
            items.push(CheckResult::notice(State::Ok, format!("Active node: {node}")).into());
        }
        Ok(items)
    }

    fn select(
        &self,
        args: CheckArgs<'_>,
        nodes: &NodeSections,
        store: &mut ValueStore,
        worst: bool,
    ) -> Result<Vec<CheckItem>, CheckError> {
        // every node runs, so all of them keep their counters current
        let outcomes: Vec<Result<NodeOutcome, CheckError>> = nodes
            .iter()
            .map(|(node, sections)| self.run_node(&args, node, sections, store))
            .collect();
        let outcomes = outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;

        // first node wins among equal states
        let selected = outcomes.iter().enumerate().fold(None::<usize>, |best, (idx, outcome)| {
            match best {
                None => Some(idx),
                Some(current) => {
                    let candidate = outcome.state.severity();
                    let incumbent = outcomes[current].state.severity();
                    let better = if worst { candidate > incumbent } else { candidate < incumbent };
                    Some(if better { idx } else { current })
                }
            }
        });
        let Some(selected) = selected else {
            return Ok(Vec::new());
        };

        let mut items = Vec::new();
        for (idx, outcome) in outcomes.into_iter().enumerate() {
            if idx == selected {
                items.extend(outcome.items);
            } else {
                // other nodes only show up in the details
                let text = format!("[{}]: {}", outcome.node, outcome.state);
                items.push(CheckResult::notice(State::Ok, text).into());
            }
        }
        Ok(items)
    }
}

impl CheckFunction for ClusterCheck {
    fn check<'a>(&'a self, args: CheckArgs<'a>, store: &'a mut ValueStore) -> CheckStream<'a> {
        let nodes: NodeSections = args
            .nodes
            .iter()
            .filter(|(_, sections)| sections.values().any(Option::is_some))
            .cloned()
            .collect();
        let collected = match self.mode {
            ClusterMode::Native => return Box::new(self.native(args, store).into_iter()),
            ClusterMode::Failover => self.failover(args, &nodes, store),
            ClusterMode::Worst => self.select(args, &nodes, store, true),
            ClusterMode::Best => self.select(args, &nodes, store, false),
        };
        match collected {
            Ok(items) => Box::new(items.into_iter().map(Ok)),
            Err(err) => Box::new(std::iter::once(Err(err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::registry::check_fn;
    use crate::sections::SectionArgs;
    use std::collections::BTreeMap;

    /// Reports the state stored in the node's `state` section
    fn plugin() -> Arc<CheckPlugin> {
        Arc::new(CheckPlugin::new(
            "state",
            check_fn(|args, _store| {
                let code = args
                    .section("state")
                    .and_then(|table| table.first()?.first()?.parse::<i64>().ok())
                    .unwrap_or(3);
                let state = State::from_code(code).unwrap_or(State::Unknown);
                Ok(vec![CheckResult::new(state, format!("state {code}")).into()])
            }),
        ))
    }

    fn node(name: &str, code: Option<&str>) -> (String, SectionArgs) {
        let mut sections = BTreeMap::new();
        let table = code.map(|code| Arc::new(vec![vec![code.to_string()]]));
        sections.insert("state".to_string(), table);
        (name.to_string(), sections)
    }

    fn run_with(
        plugin: Arc<CheckPlugin>,
        mode: ClusterMode,
        nodes: NodeSections,
        store: &mut ValueStore,
    ) -> Result<Vec<CheckItem>, CheckError> {
        let check = BuiltinClusterDispatcher.check_function(mode, &plugin);
        let empty = SectionArgs::new();
        let args = CheckArgs { item: None, params: None, sections: &empty, nodes: &nodes };
        check.check(args, store).collect()
    }

    fn run(mode: ClusterMode, nodes: NodeSections) -> Vec<CheckItem> {
        run_with(plugin(), mode, nodes, &mut ValueStore::new()).unwrap()
    }

    fn results(items: &[CheckItem]) -> Vec<&CheckResult> {
        items
            .iter()
            .filter_map(|item| match item {
                CheckItem::Result(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_worst_and_best() {
        let nodes = vec![node("n1", Some("0")), node("n2", Some("2")), node("n3", Some("3"))];

        let worst = run(ClusterMode::Worst, nodes.clone());
        assert_eq!(results(&worst)[1].summary, "[n2]: state 2");

        let best = run(ClusterMode::Best, nodes);
        assert_eq!(results(&best)[0].summary, "[n1]: state 0");
        assert_eq!(State::worst(results(&best).iter().map(|result| result.state)), State::Ok);
    }

    #[test]
    fn test_failover_uses_node_with_data() {
        let items = run(ClusterMode::Failover, vec![node("n1", None), node("n2", Some("1"))]);
        let results = results(&items);

        assert_eq!(results[0].summary, "[n2]: state 1");
        assert_eq!(results[1].details, "Active node: n2");
    }

    #[test]
    fn test_failover_warns_on_multiple_nodes() {
        let items = run(ClusterMode::Failover, vec![node("n1", Some("0")), node("n2", Some("0"))]);
        assert_eq!(results(&items)[1].state, State::Warn);
    }

    #[test]
    fn test_node_counters_are_kept_apart() {
        // `<<<if>>>`: `<timestamp> <octets>`
        let rate = Arc::new(CheckPlugin::new(
            "if",
            check_fn(|args, store| {
                let line = args.section("if").and_then(|table| table.first()).cloned();
                let values: Vec<f64> =
                    line.unwrap_or_default().iter().filter_map(|v| v.parse().ok()).collect();
                let rate = store.get_rate("in", values[0], values[1], false)?;
                Ok(vec![CheckResult::new(State::Ok, format!("In: {rate:.1}/s")).into()])
            }),
        ));
        let sample = |name: &str, time: u32, octets: u32| {
            let table = Arc::new(vec![vec![time.to_string(), octets.to_string()]]);
            (name.to_string(), BTreeMap::from([("if".to_string(), Some(table))]))
        };
        let mut store = ValueStore::new();

        for run in 0..4 {
            let nodes = vec![
                sample("n1", 100 + run * 10, 1000 + run * 500),
                sample("n2", 100 + run * 10, 9000 + run * 500),
            ];
            let outcome = run_with(rate.clone(), ClusterMode::Worst, nodes, &mut store);
            if run == 0 {
                assert!(matches!(outcome, Err(CheckError::IgnoreResults(_))));
                continue;
            }
            let items = outcome.unwrap();
            let results = results(&items);
            assert_eq!(results[0].summary, "[n1]: In: 50.0/s");
            assert_eq!(results[1].details, "[n2]: OK");
        }
        assert!(store.nested("node:n1").contains_key("in"));
        assert!(store.nested("node:n2").contains_key("in"));
    }

    #[test]
    fn test_native_without_cluster_check() {
        let items = run(ClusterMode::Native, vec![node("n1", Some("0"))]);
        assert_eq!(results(&items)[0].state, State::Unknown);
    }
}
