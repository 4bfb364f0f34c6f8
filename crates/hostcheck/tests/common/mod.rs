#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hostcheck::plugin::CheckStream;
use hostcheck::{
    CheckArgs, CheckFunction, CheckResult, Collaborators, Engine, EngineSettings, PluginRegistry,
    State, StoreBackend, ValueStore,
};

/// Check function counting its calls
#[derive(Default)]
pub struct CountingCheck {
    calls: AtomicUsize,
}

impl CountingCheck {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CheckFunction for CountingCheck {
    fn check<'a>(&'a self, args: CheckArgs<'a>, _store: &'a mut ValueStore) -> CheckStream<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lines = args.first_section().map(Vec::len).unwrap_or(0);
        let result = CheckResult::new(State::Ok, format!("{lines} line(s)"));
        Box::new(std::iter::once(Ok(result.into())))
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        max_workers: 2,
        run_timeout_secs: 10,
        perfdata_with_times: false,
        ..EngineSettings::default()
    }
}

pub fn engine(
    registry: PluginRegistry,
    collaborators: Collaborators,
    backend: Arc<dyn StoreBackend>,
) -> Engine {

    Engine::new(settings(), registry, collaborators, backend)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
