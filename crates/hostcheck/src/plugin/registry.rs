//! Check plugins and the registry the executor looks them up in.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::CheckItem;
use crate::error::CheckError;
use crate::parameters::Parameters;
use crate::sections::{SectionArgs, StringTable};
use crate::store::ValueStore;

/// Stream of items produced by one check function call
pub type CheckStream<'a> = Box<dyn Iterator<Item = Result<CheckItem, CheckError>> + 'a>;

/// Section data of every cluster node, in node order
pub type NodeSections = Vec<(String, SectionArgs)>;

/// Input of a check function call
#[derive(Clone, Copy)]
pub struct CheckArgs<'a> {
    pub item: Option<&'a str>,
    pub params: Option<&'a Parameters>,
    pub sections: &'a SectionArgs,
    /// Per node data; empty unless checking a cluster
    pub nodes: &'a NodeSections,
}

impl<'a> CheckArgs<'a> {
    pub fn section(&self, name: &str) -> Option<&'a StringTable> {
        self.sections.get(name)?.as_deref()
    }

    /// First requested section that has data
    pub fn first_section(&self) -> Option<&'a StringTable> {
        self.sections.values().find_map(|table| table.as_deref())
    }
}

/// Check logic of a plugin
pub trait CheckFunction: Send + Sync {
    fn check<'a>(&'a self, args: CheckArgs<'a>, store: &'a mut ValueStore) -> CheckStream<'a>;
}

/// Check function backed by a closure that returns all items at once
///
/// An `Err` ends the stream after nothing was yielded, like a check raising
/// before its first item.
pub struct FnCheck<F>(F);

impl<F> CheckFunction for FnCheck<F>
where
    F: Fn(&CheckArgs<'_>, &mut ValueStore) -> Result<Vec<CheckItem>, CheckError> + Send + Sync,
{
    fn check<'a>(&'a self, args: CheckArgs<'a>, store: &'a mut ValueStore) -> CheckStream<'a> {
        match (self.0)(&args, store) {
            Ok(items) => Box::new(items.into_iter().map(Ok)),
            Err(err) => Box::new(std::iter::once(Err(err))),
        }
    }
}

/// Wrap a closure as a check function
pub fn check_fn<F>(function: F) -> Arc<dyn CheckFunction>
where
    F: Fn(&CheckArgs<'_>, &mut ValueStore) -> Result<Vec<CheckItem>, CheckError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnCheck(function))
}

/// A registered check plugin
#[derive(Clone)]
pub struct CheckPlugin {
    pub name: String,
    /// Sections the plugin consumes
    pub sections: Vec<String>,
    /// Parameters are only resolved for plugins that declare defaults
    pub default_parameters: Option<Parameters>,
    pub check: Arc<dyn CheckFunction>,
    /// Check function for the native cluster mode
    pub cluster_check: Option<Arc<dyn CheckFunction>>,
}

impl CheckPlugin {
    /// Plugin consuming the section named like itself
    pub fn new(name: impl Into<String>, check: Arc<dyn CheckFunction>) -> Self {
        let name = name.into();
        Self {
            sections: vec![name.clone()],
            name,
            default_parameters: None,
            check,
            cluster_check: None,
        }
    }

    pub fn with_sections(mut self, sections: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sections = sections.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default_parameters(mut self, parameters: Parameters) -> Self {
        self.default_parameters = Some(parameters);
        self
    }

    pub fn with_cluster_check(mut self, check: Arc<dyn CheckFunction>) -> Self {
        self.cluster_check = Some(check);
        self
    }
}

impl std::fmt::Debug for CheckPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckPlugin")
            .field("name", &self.name)
            .field("sections", &self.sections)
            .field("default_parameters", &self.default_parameters)
            .field("cluster_check", &self.cluster_check.is_some())
            .finish()
    }
}

/// All known check plugins by name
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<CheckPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin, replacing one of the same name
    pub fn register(&mut self, plugin: CheckPlugin) -> &mut Self {
        self.plugins.insert(plugin.name.clone(), Arc::new(plugin));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<CheckPlugin>> {
        self.plugins.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Sorted plugin names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::types::{CheckResult, State};
    use std::collections::BTreeMap;

    #[test]
    fn test_fn_check_stream() {
        let check = check_fn(|args, _store| {
            let lines = args.section("uptime").map(Vec::len).unwrap_or(0);
            Ok(vec![CheckResult::new(State::Ok, format!("{lines} lines")).into()])
        });
        let mut sections: SectionArgs = BTreeMap::new();
        sections.insert("uptime".into(), Some(Arc::new(vec![vec!["4711".into()]])));
        let nodes = NodeSections::new();
        let args = CheckArgs { item: None, params: None, sections: &sections, nodes: &nodes };
        let mut store = ValueStore::new();

        let items: Vec<_> = check.check(args, &mut store).collect::<Result<_, _>>().unwrap();
        assert_eq!(items, vec![CheckItem::Result(CheckResult::new(State::Ok, "1 lines"))]);
    }

    #[test]
    fn test_error_ends_stream() {
        let check = check_fn(|_args, _store| Err(CheckError::ignore("later")));
        let sections = SectionArgs::new();
        let nodes = NodeSections::new();
        let args = CheckArgs { item: None, params: None, sections: &sections, nodes: &nodes };
        let mut store = ValueStore::new();

        let items: Vec<_> = check.check(args, &mut store).collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(CheckError::IgnoreResults(_))));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = PluginRegistry::new();
        registry
            .register(CheckPlugin::new("uptime", check_fn(|_, _| Ok(Vec::new()))))
            .register(
                CheckPlugin::new("df", check_fn(|_, _| Ok(Vec::new())))
                    .with_sections(["df", "df_inodes"]),
            );


        assert_eq!(registry.names(), vec!["df", "uptime"]);
        assert_eq!(registry.get("df").unwrap().sections, vec!["df", "df_inodes"]);
        assert!(registry.get("mem").is_none());
    }
}
