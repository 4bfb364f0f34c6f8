//! Host description files: the host, its services and the data fetched for it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use hostcheck::sections::parse_agent_output;
use hostcheck::{ConfiguredService, FetchedPayload, HostConfig, RawData, SectionStore};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct HostFile {
    pub host: HostConfig,
    #[serde(default)]
    pub services: Vec<ConfiguredService>,
    #[serde(default)]
    pub payloads: Vec<FetchedPayload>,
}

impl HostFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        serde_json::from_str(&raw).with_context(|| format!("invalid host file {}", path.display()))
    }

    /// Sections of all successful payloads, for discovery
    pub fn sections(&self) -> SectionStore {
        let now = chrono::Utc::now().timestamp();
        let mut store = SectionStore::new();
        for payload in &self.payloads {
            let RawData::Output(output) = &payload.data else {
                continue;
            };
            let parsed = parse_agent_output(output);
            for error in &parsed.errors {
                warn!("[{}] {}", payload.source_id, error);
            }
            store.add_parsed(&payload.host_key, parsed.sections, now);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostcheck::{HostKey, SectionView};

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web01.json");
        fs::write(
            &path,
            r#"{
                "host": {"name": "web01"},
                "services": [{"plugin": "df", "item": "/", "description": "Filesystem /"}],
                "payloads": [
                    {"source_id": "agent", "host_key": {"hostname": "web01"},
                     "data": {"output": "<<<df>>>\n/ 1000 850\n"}},
                    {"source_id": "snmp", "fetcher_type": "snmp", "host_key": {"hostname": "web01"},
                     "data": {"error": "Timeout"}}
                ]
            }"#,
        )
        .unwrap();

        let host_file = HostFile::load(&path).unwrap();
        assert_eq!(host_file.services[0].description, "Filesystem /");
        assert_eq!(host_file.payloads.len(), 2);

        let sections = host_file.sections();
        let df = sections.lookup(&HostKey::host("web01"), &["df".to_string()]).unwrap();
        assert_eq!(df["df"].as_deref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_missing_file() {
        let err = HostFile::load(Path::new("/nonexistent/host.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
