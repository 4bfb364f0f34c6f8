//! Normalization of legacy discovery output.

use serde::Serialize;

use crate::error::ParameterError;
use crate::parameters::{parse_literal, ConstantNamespace, ParamValue, Parameters};
use crate::sections::SectionArgs;

/// A service found during discovery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredService {
    pub item: Option<String>,
    pub parameters: Parameters,
}

impl DiscoveredService {
    pub fn new(item: Option<&str>, parameters: Parameters) -> Self {
        Self { item: item.map(str::to_string), parameters }
    }
}

/// One element returned by a legacy discovery function
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyDiscoveryItem {
    Service(DiscoveredService),
    /// `(item, params)` or `(host, item, params)`
    Raw(ParamValue),
}

/// Result of normalizing one legacy discovery element
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEntry {
    Service(DiscoveredService),
    /// Unrecognized shape, left for validation further up to reject
    Unrecognized(ParamValue),
}

fn resolve_parameters(
    raw: &ParamValue,
    constants: &ConstantNamespace,
) -> Result<Parameters, ParameterError> {
    let value = match raw {
        ParamValue::Str(expression) => parse_literal(expression, constants)?,
        ParamValue::None => return Ok(Parameters::default()),
        other => other.clone(),
    };
    Ok(Parameters::wrap(value))
}

fn normalize_one(
    item: LegacyDiscoveryItem,
    constants: &ConstantNamespace,
) -> Result<DiscoveryEntry, ParameterError> {
    let raw = match item {
        LegacyDiscoveryItem::Service(service) => return Ok(DiscoveryEntry::Service(service)),
        LegacyDiscoveryItem::Raw(raw) => raw,
    };
    let (service_item, params) = match raw.as_sequence() {
        Some([service_item, params]) | Some([_, service_item, params]) => (service_item, params),
        _ => return Ok(DiscoveryEntry::Unrecognized(raw)),
    };
    let service_item = match service_item {
        ParamValue::Str(name) => Some(name.as_str()),
        ParamValue::None => None,
        _ => return Ok(DiscoveryEntry::Unrecognized(raw)),
    };
    let parameters = resolve_parameters(params, constants)?;
    Ok(DiscoveryEntry::Service(DiscoveredService::new(service_item, parameters)))
}

/// Turn legacy discovery output into discovered services
///
/// String parameters are parsed as literals; names in them must be defined in
/// the plugin's `constants`.
pub fn normalize_discovery(
    items: Vec<LegacyDiscoveryItem>,
    constants: &ConstantNamespace,
) -> Result<Vec<DiscoveryEntry>, ParameterError> {
    items.into_iter().map(|item| normalize_one(item, constants)).collect()
}

/// Signature of a legacy discovery function
pub type LegacyDiscoveryFn = dyn Fn(&SectionArgs) -> Vec<LegacyDiscoveryItem> + Send + Sync;

/// A legacy discovery function together with the constants its parameter
/// strings may refer to
pub struct LegacyDiscovery {
    function: Box<LegacyDiscoveryFn>,
    constants: ConstantNamespace,
}

impl LegacyDiscovery {
    pub fn new<F>(function: F, constants: ConstantNamespace) -> Self
    where
        F: Fn(&SectionArgs) -> Vec<LegacyDiscoveryItem> + Send + Sync + 'static,
    {
        Self { function: Box::new(function), constants }
    }

    pub fn discover(&self, sections: &SectionArgs) -> Result<Vec<DiscoveryEntry>, ParameterError> {
        normalize_discovery((self.function)(sections), &self.constants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::WRAPPER_KEY;

    fn constants() -> ConstantNamespace {
        let mut namespace = ConstantNamespace::new();
        let levels = ParamValue::Tuple(vec![80.0.into(), 90.0.into()]);
        namespace.insert("df_default_levels".into(), levels);
        namespace
    }

    #[test]
    fn test_tuple_shapes() {
        let entries = normalize_discovery(
            vec![
                LegacyDiscoveryItem::Raw(ParamValue::Tuple(vec![
                    "/".into(),
                    "df_default_levels".into(),
                ])),
                LegacyDiscoveryItem::Raw(ParamValue::Tuple(vec![
                    ParamValue::None,
                    "/var".into(),
                    "{'levels': (70.0, 80.0)}".into(),
                ])),
                LegacyDiscoveryItem::Raw(ParamValue::Tuple(vec![
                    ParamValue::None,
                    ParamValue::None,
                ])),
            ],
            &constants(),
        )
        .unwrap();

        let DiscoveryEntry::Service(root) = &entries[0] else { panic!("expected a service") };
        assert_eq!(root.item.as_deref(), Some("/"));
        assert_eq!(
            root.parameters.get(WRAPPER_KEY),
            Some(&ParamValue::Tuple(vec![80.0.into(), 90.0.into()]))
        );

        let DiscoveryEntry::Service(var) = &entries[1] else { panic!("expected a service") };
        assert_eq!(var.item.as_deref(), Some("/var"));
        assert!(var.parameters.contains_key("levels"));

        let DiscoveryEntry::Service(itemless) = &entries[2] else { panic!("expected a service") };
        assert_eq!(itemless.item, None);
        assert!(itemless.parameters.is_empty());
    }

    #[test]
    fn test_unknown_constant_fails() {
        let raw = ParamValue::Tuple(vec!["/".into(), "no_such_levels".into()]);
        let result = normalize_discovery(vec![LegacyDiscoveryItem::Raw(raw)], &constants());
        assert!(matches!(
            result,
            Err(ParameterError::UnknownConstant(name)) if name == "no_such_levels"
        ));
    }

    #[test]
    fn test_unrecognized_passes_through() {
        let raw = ParamValue::Int(42);
        let entries =
            normalize_discovery(vec![LegacyDiscoveryItem::Raw(raw.clone())], &constants()).unwrap();

        assert_eq!(entries, vec![DiscoveryEntry::Unrecognized(raw)]);
    }
}
