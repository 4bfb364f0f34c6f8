//! In-memory section view built from parsed payloads.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::parser::ParsedSection;
use super::{CacheInfo, SectionArgs, SectionView, StringTable};
use crate::service::HostKey;

#[derive(Debug, Clone)]
struct StoredSection {
    table: Arc<StringTable>,
    cache: Option<CacheInfo>,
}

/// Parsed sections of all host keys taking part in a run
#[derive(Debug, Clone, Default)]
pub struct SectionStore {
    hosts: HashMap<HostKey, BTreeMap<String, StoredSection>>,
}

impl SectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the sections of one parsed payload
    ///
    /// `now` is the Unix time used to compute the age of cached sections.
    /// Sections already present for the host key are extended.
    pub fn add_parsed(
        &mut self,
        host_key: &HostKey,
        sections: BTreeMap<String, ParsedSection>,
        now: i64,
    ) {
        for (name, section) in sections {
            let cache = section.cached.map(|(timestamp, interval)| CacheInfo {
                age: now.saturating_sub(timestamp).max(0) as u64,
                max_age: interval,
            });
            self.insert(host_key, name, section.table, cache);
        }
    }

    /// Add a single uncached section
    pub fn add_section(&mut self, host_key: &HostKey, name: impl Into<String>, table: StringTable) {
        self.insert(host_key, name.into(), table, None);
    }

    fn insert(
        &mut self,
        host_key: &HostKey,
        name: String,
        table: StringTable,
        cache: Option<CacheInfo>,
    ) {
        let sections = self.hosts.entry(host_key.clone()).or_default();
        match sections.get_mut(&name) {
            Some(existing) => {
                Arc::make_mut(&mut existing.table).extend(table);
                existing.cache = CacheInfo::combine(existing.cache.into_iter().chain(cache));
            }
            None => {
                sections.insert(name, StoredSection { table: Arc::new(table), cache });
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.values().all(BTreeMap::is_empty)
    }

    /// Names of all sections present for a host key
    pub fn section_names(&self, host_key: &HostKey) -> Vec<String> {
        self.hosts
            .get(host_key)
            .map(|sections| sections.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl SectionView for SectionStore {
    fn lookup(&self, host_key: &HostKey, section_names: &[String]) -> Option<SectionArgs> {
        let sections = self.hosts.get(host_key)?;
        let args: SectionArgs = section_names
            .iter()
            .map(|name| (name.clone(), sections.get(name).map(|stored| stored.table.clone())))
            .collect();
        args.values().any(Option::is_some).then_some(args)
    }

    fn cache_info(&self, section_names: &[String]) -> Option<CacheInfo> {
        CacheInfo::combine(
            self.hosts
                .values()
                .flat_map(|sections| section_names.iter().filter_map(|name| sections.get(name)))
                .filter_map(|stored| stored.cache),
        )
    }
}
