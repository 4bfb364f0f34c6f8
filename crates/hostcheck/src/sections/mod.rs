//! Section data: the agent output parser and the lookup view used by the
//! executor.

pub mod parser;
pub mod store;

pub use parser::{parse_agent_output, ParsedPayload, ParsedSection};
pub use store::SectionStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::service::HostKey;

/// Raw section content: lines split into words
pub type StringTable = Vec<Vec<String>>;

/// Sections requested by a plugin, `None` for those without data
pub type SectionArgs = BTreeMap<String, Option<Arc<StringTable>>>;

/// Age and maximum age of cached section data, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub age: u64,
    pub max_age: u64,
}

impl CacheInfo {
    /// Combine several entries: the oldest age, the shortest interval
    pub fn combine(entries: impl IntoIterator<Item = CacheInfo>) -> Option<CacheInfo> {
        entries.into_iter().reduce(|acc, entry| CacheInfo {
            age: acc.age.max(entry.age),
            max_age: acc.max_age.min(entry.max_age),
        })
    }
}

/// Lookup of parsed sections by host key and section name
pub trait SectionView: Send + Sync {
    /// Sections for one host key; `None` if none of them has data
    fn lookup(&self, host_key: &HostKey, section_names: &[String]) -> Option<SectionArgs>;

    /// Combined cache information of the named sections
    fn cache_info(&self, section_names: &[String]) -> Option<CacheInfo>;
}
