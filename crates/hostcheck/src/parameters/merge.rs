//! Priority merge of parameter blocks.

use std::collections::BTreeMap;

use super::value::ParamValue;

/// Merge parameter blocks in priority order
///
/// When every block is a mapping, the result holds the union of all keys and
/// each key takes its value from the earliest block in `prioritized` defining
/// it; `base` only fills keys no prioritized block defines.
///
/// Non-mapping blocks cannot be merged key-wise: the first prioritized block
/// wins as a whole, and `base` is returned when there is none.
pub fn merge(prioritized: &[ParamValue], base: &ParamValue) -> ParamValue {
    if !base.is_map() || !prioritized.iter().all(ParamValue::is_map) {
        return prioritized.first().cloned().unwrap_or_else(|| base.clone());
    }

    let mut merged: BTreeMap<String, ParamValue> = BTreeMap::new();
    for map in prioritized.iter().chain(std::iter::once(base)).filter_map(ParamValue::as_map) {
        for (key, value) in map {
            merged.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    ParamValue::Map(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, i64)]) -> ParamValue {
        ParamValue::Map(
            entries.iter().map(|(k, v)| (k.to_string(), ParamValue::Int(*v))).collect(),
        )
    }

    fn pair(a: i64, b: i64) -> ParamValue {
        ParamValue::Tuple(vec![ParamValue::Int(a), ParamValue::Int(b)])
    }

    #[test]
    fn test_earliest_prioritized_wins() {
        let prioritized = [map(&[("a", 1)]), map(&[("a", 2), ("b", 2)])];
        let merged = merge(&prioritized, &map(&[("a", 3), ("c", 3)]));
        assert_eq!(merged, map(&[("a", 1), ("b", 2), ("c", 3)]));
    }

    #[test]
    fn test_empty_prioritized_returns_base() {
        assert_eq!(merge(&[], &map(&[("x", 1)])), map(&[("x", 1)]));
        assert_eq!(merge(&[], &pair(3, 3)), pair(3, 3));
    }

    #[test]
    fn test_non_mapping_first_wins() {
        assert_eq!(merge(&[pair(1, 1), pair(2, 2)], &ParamValue::empty_map()), pair(1, 1));
    }

    #[test]
    fn test_mixed_shapes_take_first() {
        assert_eq!(
            merge(&[map(&[("a", 1)]), pair(2, 2)], &ParamValue::empty_map()),
            map(&[("a", 1)])
        );

        assert_eq!(merge(&[map(&[("a", 1)])], &pair(0, 0)), map(&[("a", 1)]));
    }
}
