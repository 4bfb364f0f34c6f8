//! Run time accounting for the host summary.

use nix::sys::resource::{getrusage, UsageWho};
use nix::sys::time::{TimeVal, TimeValLike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::plugin::types::{CheckResult, Metric, State};

/// How a data source fetched its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetcherType {
    #[default]
    Tcp,
    Program,
    Piggyback,
    Snmp,
    Ipmi,
    Push,
}

impl FetcherType {
    /// Perfdata category the fetch time is accounted to
    pub fn time_category(self) -> Option<&'static str> {
        match self {
            FetcherType::Tcp | FetcherType::Piggyback => Some("agent"),
            FetcherType::Program => Some("ds"),
            FetcherType::Snmp => Some("snmp"),
            FetcherType::Ipmi | FetcherType::Push => None,
        }
    }
}

/// CPU seconds of this process and its children
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
    pub children_user: f64,
    pub children_system: f64,
}

fn seconds(time: TimeVal) -> f64 {
    time.num_microseconds() as f64 / 1_000_000.0
}

impl CpuTimes {
    pub fn now() -> Self {
        let own = getrusage(UsageWho::RUSAGE_SELF);
        let children = getrusage(UsageWho::RUSAGE_CHILDREN);
        match (own, children) {
            (Ok(own), Ok(children)) => Self {
                user: seconds(own.user_time()),
                system: seconds(own.system_time()),
                children_user: seconds(children.user_time()),
                children_system: seconds(children.system_time()),
            },
            (Err(err), _) | (_, Err(err)) => {
                warn!("Failed to read resource usage: {}", err);
                Self::default()
            }
        }
    }

    fn since(&self, earlier: &CpuTimes) -> Self {
        Self {
            user: (self.user - earlier.user).max(0.0),
            system: (self.system - earlier.system).max(0.0),
            children_user: (self.children_user - earlier.children_user).max(0.0),
            children_system: (self.children_system - earlier.children_system).max(0.0),
        }
    }
}

/// Measures wall clock and CPU time of a run
pub struct RunTimer {
    started: Instant,
    cpu: CpuTimes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunTimes {
    pub elapsed: Duration,
    pub cpu: CpuTimes,
}

impl RunTimer {
    pub fn start() -> Self {
        Self { started: Instant::now(), cpu: CpuTimes::now() }
    }

    pub fn stop(self) -> RunTimes {
        RunTimes { elapsed: self.started.elapsed(), cpu: CpuTimes::now().since(&self.cpu) }
    }
}

fn millis(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// The `execution time` line and its perfdata
///
/// Fetch durations count towards the execution time. With `with_times` the
/// CPU times and per category fetch times are added to the perfdata.
pub fn timing_results(
    times: &RunTimes,
    fetches: &[(FetcherType, Duration)],
    with_times: bool,
) -> (CheckResult, Vec<Metric>) {
    let elapsed = times.elapsed + fetches.iter().map(|(_, duration)| *duration).sum::<Duration>();
    let elapsed = elapsed.as_secs_f64();
    let result = CheckResult::new(State::Ok, format!("execution time {elapsed:.1} sec"));

    let mut metrics = vec![Metric::new("execution_time", millis(elapsed))];
    if with_times {
        let cpu = &times.cpu;
        metrics.extend([
            Metric::new("user_time", millis(cpu.user)),
            Metric::new("system_time", millis(cpu.system)),
            Metric::new("children_user_time", millis(cpu.children_user)),
            Metric::new("children_system_time", millis(cpu.children_system)),
        ]);

        let mut per_category: BTreeMap<&str, Duration> = BTreeMap::new();
        for (fetcher_type, duration) in fetches {
            if let Some(category) = fetcher_type.time_category() {
                *per_category.entry(category).or_default() += *duration;
            }
        }
        metrics.extend(per_category.into_iter().map(|(category, duration)| {
            Metric::new(format!("cmk_time_{category}"), millis(duration.as_secs_f64()))
        }));
    }
    (result, metrics)
}
