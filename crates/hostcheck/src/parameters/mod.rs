//! Parameter model: values, priority merge and time-specific resolution.
//!
//! Check parameters arrive as an ordered list of rules, each of which may
//! vary by timeperiod. Resolution merges them into one concrete block.

pub mod literal;
pub mod merge;
pub mod timespecific;
pub mod value;

pub use literal::{parse_literal, ConstantNamespace};
pub use merge::merge;
pub use timespecific::{TimespecificParameterSet, TimespecificParameters};
pub use value::{ParamValue, Parameters, WRAPPER_KEY};
