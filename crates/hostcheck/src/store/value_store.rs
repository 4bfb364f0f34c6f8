//! Per-host counter store with one namespace per service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

use super::backend::StoreBackend;
use crate::error::{CheckError, StoreError};
use crate::service::ServiceId;

/// Key/value state of one service, kept across runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueStore(BTreeMap<String, Value>);

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nested store kept under `key`, empty when missing or not an object
    pub fn nested(&self, key: &str) -> ValueStore {
        match self.0.get(key) {
            Some(Value::Object(map)) => {
                ValueStore(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            _ => ValueStore::default(),
        }
    }

    pub fn set_nested(&mut self, key: impl Into<String>, nested: ValueStore) {
        self.0.insert(key.into(), Value::Object(nested.0.into_iter().collect()));
    }

    /// Rate of change of a counter since the last call with the same key
    ///
    /// The first sample only initializes the counter and yields an
    /// ignore-results condition, as does a non-advancing timestamp. A
    /// decreasing counter is reported as an overflow when `raise_overflow` is
    /// set.
    pub fn get_rate(
        &mut self,
        key: &str,
        this_time: f64,
        this_value: f64,
        raise_overflow: bool,
    ) -> Result<f64, CheckError> {
        let previous = self.get(key).and_then(|stored| {
            let pair = stored.as_array()?;
            Some((pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
        });
        self.set(key, serde_json::json!([this_time, this_value]));

        let Some((last_time, last_value)) = previous else {
            return Err(CheckError::ignore(format!("Initialized: '{key}'")));
        };
        if this_time <= last_time {
            return Err(CheckError::ignore(format!("No time difference for '{key}'")));
        }
        let rate = (this_value - last_value) / (this_time - last_time);
        if rate < 0.0 && raise_overflow {
            return Err(CheckError::ignore(format!("Value overflow for '{key}'")));
        }
        Ok(rate)
    }
}

/// All service namespaces of one host for the duration of one run
///
/// Services work on a copy of their namespace and check it back in
/// afterwards, so no two services ever touch the same storage keys. The store
/// is written back at most once, when released.
pub struct CounterStore {
    host: String,
    backend: Arc<dyn StoreBackend>,
    namespaces: Mutex<BTreeMap<String, ValueStore>>,
    read_only: bool,
    released: AtomicBool,
}

impl CounterStore {
    /// Load the host's stored state
    pub fn open(
        host: impl Into<String>,
        backend: Arc<dyn StoreBackend>,
        read_only: bool,
    ) -> Result<Self, StoreError> {
        let host = host.into();
        let namespaces = backend.load(&host)?;
        debug!(host = %host, namespaces = namespaces.len(), read_only, "Counter store opened");
        Ok(Self {
            host,
            backend,
            namespaces: Mutex::new(namespaces),
            read_only,
            released: AtomicBool::new(false),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ValueStore>> {
        self.namespaces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the namespace of a service
    ///
    /// The stored namespace stays in place until `checkin` replaces it, so a
    /// service that never checks in keeps its previous state.
    pub fn checkout(&self, service: &ServiceId) -> ValueStore {
        self.lock().get(&service.storage_key()).cloned().unwrap_or_default()
    }

    /// Replace the namespace after the service ran
    pub fn checkin(&self, service: &ServiceId, values: ValueStore) {
        if self.released.load(Ordering::SeqCst) {
            debug!(service = %service, "Counter store already released, dropping late update");
            return;
        }
        self.lock().insert(service.storage_key(), values);
    }

    /// Snapshot of a namespace, for inspection
    pub fn peek(&self, service: &ServiceId) -> Option<ValueStore> {
        self.lock().get(&service.storage_key()).cloned()
    }

    /// Persist the store unless opened read-only; later calls are no-ops
    pub fn release(&self) -> Result<(), StoreError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.read_only {
            debug!(host = %self.host, "Counter store released without saving (read-only)");
            return Ok(());
        }
        let namespaces = self.lock();
        self.backend.save(&self.host, &namespaces)?;
        info!("Saved counter store of {} ({} namespaces)", self.host, namespaces.len());
        Ok(())
    }
}

/// Releases the counter store when dropped, so every exit path of a run
/// (errors, timeouts, cancellation) still writes it back exactly once
pub struct CounterStoreGuard(Arc<CounterStore>);

impl CounterStoreGuard {
    pub fn new(store: Arc<CounterStore>) -> Self {
        Self(store)
    }

    pub fn store(&self) -> &Arc<CounterStore> {
        &self.0
    }

    /// Release explicitly, surfacing persistence errors
    pub fn release(self) -> Result<(), StoreError> {
        self.0.release()
    }
}

impl Drop for CounterStoreGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.release() {
            error!("Failed to release counter store of {}: {}", self.0.host, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::MemoryBackend;

    fn service(item: &str) -> ServiceId {
        ServiceId::new("if", Some(item.to_string()))
    }

    #[test]
    fn test_get_rate_initializes_then_computes() {
        let mut store = ValueStore::new();

        let initialized = store.get_rate("in", 100.0, 1000.0, false);
        assert!(matches!(initialized, Err(CheckError::IgnoreResults(_))));
        assert_eq!(store.get_rate("in", 110.0, 1500.0, false).unwrap(), 50.0);
        let no_time_passed = store.get_rate("in", 110.0, 1600.0, false);
        assert!(matches!(no_time_passed, Err(CheckError::IgnoreResults(_))));
        let overflow = store.get_rate("in", 120.0, 0.0, true);
        assert!(matches!(
            overflow,
            Err(CheckError::IgnoreResults(msg)) if msg.contains("overflow")
        ));


    }

    #[test]
    fn test_namespaces_are_isolated() {
        let backend = Arc::new(MemoryBackend::new());
        let store = CounterStore::open("host1", backend.clone(), false).unwrap();

        let mut eth0 = store.checkout(&service("eth0"));
        eth0.set("counter", 1);
        store.checkin(&service("eth0"), eth0);

        assert!(store.checkout(&service("eth1")).is_empty());
        assert_eq!(store.peek(&service("eth0")).unwrap().get("counter"), Some(&Value::from(1)));
    }

    #[test]
    fn test_nested_stores() {
        let mut store = ValueStore::new();
        assert!(store.nested("node:n1").is_empty());

        let mut node = ValueStore::new();
        node.set("in", 1);
        store.set_nested("node:n1", node.clone());
        store.set("plain", 2);

        assert_eq!(store.nested("node:n1"), node);
        assert!(store.nested("plain").is_empty());
    }

    #[test]
    fn test_release_keeps_namespaces_still_checked_out() {
        let backend = Arc::new(MemoryBackend::new());
        let mut seeded = BTreeMap::new();
        let mut values = ValueStore::new();
        values.set("in", serde_json::json!([100.0, 1000.0]));
        seeded.insert(service("eth0").storage_key(), values.clone());
        backend.save("host1", &seeded).unwrap();

        let store = CounterStore::open("host1", backend.clone(), false).unwrap();
        let mut in_flight = store.checkout(&service("eth0"));
        in_flight.set("in", serde_json::json!([110.0, 1500.0]));
        store.release().unwrap();
        store.checkin(&service("eth0"), in_flight);

        assert_eq!(backend.load("host1").unwrap()[&service("eth0").storage_key()], values);
    }

    #[test]
    fn test_release_persists_once() {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(CounterStore::open("host1", backend.clone(), false).unwrap());
        let mut values = store.checkout(&service("eth0"));
        values.set("k", "v");
        store.checkin(&service("eth0"), values);

        {
            let _guard = CounterStoreGuard::new(store.clone());
        }
        assert_eq!(backend.save_count(), 1);
        store.release().unwrap();
        assert_eq!(backend.save_count(), 1);

        // updates after release are dropped
        store.checkin(&service("eth1"), ValueStore::new());
        assert!(store.peek(&service("eth1")).is_none());
        assert_eq!(backend.load("host1").unwrap().len(), 1);
    }

    #[test]
    fn test_read_only_never_saves() {
        let backend = Arc::new(MemoryBackend::new());
        let store = CounterStore::open("host1", backend.clone(), true).unwrap();
        store.checkin(&service("eth0"), ValueStore::new());
        store.release().unwrap();

        assert_eq!(backend.save_count(), 0);
    }
}
