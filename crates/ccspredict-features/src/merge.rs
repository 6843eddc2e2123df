//! Merging of per-provider descriptor sets.

use ccspredict_common::DescriptorSet;

/// Union of `sets` in iteration order. A key present in more than one set
/// keeps the value from the last set that has it.
pub fn merge_descriptor_sets<I>(sets: I) -> DescriptorSet
where
    I: IntoIterator<Item = DescriptorSet>,
{
    let mut merged = DescriptorSet::new();
    for set in sets {
        merged.extend(set);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccspredict_common::DescriptorValue;

    fn set(entries: &[(&str, f64)]) -> DescriptorSet {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), DescriptorValue::Scalar(*v)))
            .collect()
    }

    #[test]
    fn test_last_writer_wins() {
        let merged = merge_descriptor_sets([set(&[("A", 1.0), ("B", 2.0)]), set(&[("B", 9.0), ("C", 3.0)])]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged["A"], DescriptorValue::Scalar(1.0));
        assert_eq!(merged["B"], DescriptorValue::Scalar(9.0));
        assert_eq!(merged["C"], DescriptorValue::Scalar(3.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_descriptor_sets(Vec::<DescriptorSet>::new()).is_empty());
    }
}
