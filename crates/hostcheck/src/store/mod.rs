//! Counter/rate state kept across check runs.

pub mod backend;
pub mod value_store;

pub use backend::{FileBackend, MemoryBackend, StoreBackend};
pub use value_store::{CounterStore, CounterStoreGuard, ValueStore};
