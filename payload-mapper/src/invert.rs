//! Builds the inverse of a mapping's `field_map` rules: swap source and
//! target, and swap the transformation for its own inverse.
//!
//! Only field-map rules are invertible — `value_assignments`,
//! `derived_values`, `auto_generations` and `conditionals` synthesize data
//! that has no well-defined source field to invert back into. A
//! transformation primitive that loses information (`Uppercase`, `Trim`,
//! `Mask`, `DateFormat`, `NumberFormat`) has no inverse either and is
//! dropped from the result rather than guessed at.

use payment_core_types::{FieldMapRule, TransformationPrimitive};

/// Return the subset of `rules` that round-trip, each with source and
/// target swapped and its transformation replaced by its own inverse.
pub fn invert_field_map(rules: &[FieldMapRule]) -> Vec<FieldMapRule> {
    rules
        .iter()
        .filter_map(|rule| {
            let transformation = match &rule.transformation {
                None => None,
                Some(TransformationPrimitive::Encrypt) => Some(TransformationPrimitive::Decrypt),
                Some(TransformationPrimitive::Decrypt) => Some(TransformationPrimitive::Encrypt),
                Some(_) => return None,
            };
            Some(FieldMapRule {
                source_field: rule.target_field.clone(),
                target_field: rule.source_field.clone(),
                transformation,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_source_and_target_for_untransformed_rules() {
        let rules = vec![FieldMapRule {
            source_field: "debtor_name".to_string(),
            target_field: "debtor.name".to_string(),
            transformation: None,
        }];
        let inverted = invert_field_map(&rules);
        assert_eq!(inverted.len(), 1);
        assert_eq!(inverted[0].source_field, "debtor.name");
        assert_eq!(inverted[0].target_field, "debtor_name");
        assert_eq!(inverted[0].transformation, None);
    }

    #[test]
    fn swaps_encrypt_and_decrypt() {
        let rules = vec![FieldMapRule {
            source_field: "account_number".to_string(),
            target_field: "account_ciphertext".to_string(),
            transformation: Some(TransformationPrimitive::Encrypt),
        }];
        let inverted = invert_field_map(&rules);
        assert_eq!(inverted[0].source_field, "account_ciphertext");
        assert_eq!(inverted[0].target_field, "account_number");
        assert_eq!(
            inverted[0].transformation,
            Some(TransformationPrimitive::Decrypt)
        );
    }

    #[test]
    fn drops_lossy_transformations() {
        let rules = vec![FieldMapRule {
            source_field: "account_number".to_string(),
            target_field: "account_masked".to_string(),
            transformation: Some(TransformationPrimitive::Mask { visible_suffix: 4 }),
        }];
        assert!(invert_field_map(&rules).is_empty());
    }
}
