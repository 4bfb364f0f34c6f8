//! Parameter values and the read-only `Parameters` mapping handed to check functions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Key under which non-mapping parameter blocks are wrapped for mapping-only consumers
pub const WRAPPER_KEY: &str = "auto-migration-wrapper-key";

/// A dynamically shaped configuration value
///
/// Legacy plugins accept whole parameter blocks as bare tuples or scalars, so
/// parameters cannot be restricted to mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<ParamValue>),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Empty mapping
    pub fn empty_map() -> Self {
        ParamValue::Map(BTreeMap::new())
    }

    pub fn is_map(&self) -> bool {
        matches!(self, ParamValue::Map(_))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::None)
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers are widened
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Elements of a tuple or list
    pub fn as_sequence(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::Tuple(items) | ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the value's shape, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::None => "none",
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "str",
            ParamValue::Tuple(_) => "tuple",
            ParamValue::List(_) => "list",
            ParamValue::Map(_) => "mapping",
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<BTreeMap<String, ParamValue>> for ParamValue {
    fn from(value: BTreeMap<String, ParamValue>) -> Self {
        ParamValue::Map(value)
    }
}

fn write_sequence(f: &mut fmt::Formatter<'_>, items: &[ParamValue]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Literal notation, readable back by [`crate::parameters::parse_literal`]
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::None => write!(f, "None"),
            ParamValue::Bool(true) => write!(f, "True"),
            ParamValue::Bool(false) => write!(f, "False"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.1}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            ParamValue::Tuple(items) => {
                write!(f, "(")?;
                write_sequence(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            ParamValue::List(items) => {
                write!(f, "[")?;
                write_sequence(f, items)?;
                write!(f, "]")
            }
            ParamValue::Map(map) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{key}': {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Immutable, ordered, string-keyed mapping passed to check functions
///
/// Cloning is cheap; the underlying map is shared.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Arc<BTreeMap<String, ParamValue>>);

impl Parameters {
    pub fn new(map: BTreeMap<String, ParamValue>) -> Self {
        Self(Arc::new(map))
    }

    /// Turn any evaluated parameter value into a mapping
    ///
    /// Mappings are taken as they are; anything else ends up under [`WRAPPER_KEY`].
    pub fn wrap(value: ParamValue) -> Self {
        match value {
            ParamValue::Map(map) => Self::new(map),
            other => {
                let mut map = BTreeMap::new();
                map.insert(WRAPPER_KEY.to_string(), other);
                Self::new(map)
            }
        }
    }

    /// Inverse of [`Parameters::wrap`]
    pub fn unwrap_legacy(&self) -> ParamValue {
        if self.0.len() == 1 {
            if let Some(value) = self.0.get(WRAPPER_KEY) {
                return value.clone();
            }
        }
        ParamValue::Map(self.0.as_ref().clone())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Look up a `(warn, crit)` level pair stored as a two-element sequence
    pub fn levels(&self, key: &str) -> Option<(f64, f64)> {
        match self.get(key)?.as_sequence()? {
            [warn, crit] => Some((warn.as_f64()?, crit.as_f64()?)),
            _ => None,
        }
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = (&'a String, &'a ParamValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, ParamValue)> for Parameters {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", ParamValue::Map(self.0.as_ref().clone()))
    }
}
