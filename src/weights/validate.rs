use super::types::{SetupItem, FULL_WEIGHT, WEIGHT_TOLERANCE};
use crate::error::WeightError;

/// Checks every sibling group in the tree against the 100% rule.
///
/// Extra-credit nodes are ignored. When some remaining sibling is unweighted, the specified
/// weights may not exceed 100%; otherwise they must sum to exactly 100%. A level with nothing
/// left after filtering is skipped, but its categories are still descended into.
pub fn validate_gradebook_weights(
    items: &[SetupItem],
    level_name: &str,
    error_prefix: &str,
) -> Result<(), WeightError> {
    let regular: Vec<&SetupItem> = items.iter().filter(|i| !i.extra_credit).collect();

    if !regular.is_empty() {
        let total_specified: f64 = regular.iter().filter_map(|i| i.weight).sum();
        let has_unspecified = regular.iter().any(|i| i.weight.is_none());

        if has_unspecified {
            if total_specified > FULL_WEIGHT + WEIGHT_TOLERANCE {
                return Err(WeightError::WeightLimitExceeded {
                    message: format!(
                        "{}: specified weights at {} total {:.2}%, which exceeds 100%",
                        error_prefix, level_name, total_specified
                    ),
                });
            }
        } else if (total_specified - FULL_WEIGHT).abs() > WEIGHT_TOLERANCE {
            return Err(WeightError::WeightLimitExceeded {
                message: format!(
                    "{}: weights at {} total {:.2}% but must equal exactly 100% when every item has a specified weight",
                    error_prefix, level_name, total_specified
                ),
            });
        }
    }

    for cat in items.iter().filter(|i| i.is_category()) {
        let nested = format!("{} > {}", level_name, cat.name);
        validate_gradebook_weights(cat.children(), &nested, error_prefix)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(r: Result<(), WeightError>) -> String {
        match r {
            Err(WeightError::WeightLimitExceeded { message }) => message,
            other => panic!("expected weight limit error, got {:?}", other),
        }
    }

    #[test]
    fn exact_hundred_passes() {
        let items = vec![
            SetupItem::leaf(1, "A", Some(40.0), 10.0),
            SetupItem::leaf(2, "B", Some(60.0), 10.0),
        ];
        assert!(validate_gradebook_weights(&items, "Root level", "Cannot update item").is_ok());
    }

    #[test]
    fn all_specified_below_hundred_fails() {
        let items = vec![
            SetupItem::leaf(1, "A", Some(50.0), 10.0),
            SetupItem::leaf(2, "B", Some(30.0), 10.0),
        ];
        let msg = message(validate_gradebook_weights(&items, "Root level", "Cannot update item"));
        assert!(msg.contains("80.00%"), "{}", msg);
        assert!(msg.contains("must equal exactly 100%"), "{}", msg);
        assert!(msg.starts_with("Cannot update item"), "{}", msg);
    }

    #[test]
    fn tolerance_absorbs_float_drift() {
        let items = vec![
            SetupItem::leaf(1, "A", Some(33.33), 10.0),
            SetupItem::leaf(2, "B", Some(33.33), 10.0),
            SetupItem::leaf(3, "C", Some(33.34), 10.0),
        ];
        assert!(validate_gradebook_weights(&items, "Root level", "x").is_ok());

        let off = vec![
            SetupItem::leaf(1, "A", Some(50.0), 10.0),
            SetupItem::leaf(2, "B", Some(50.02), 10.0),
        ];
        assert!(validate_gradebook_weights(&off, "Root level", "x").is_err());
    }

    #[test]
    fn unspecified_sibling_allows_under_hundred_but_not_over() {
        let ok = vec![
            SetupItem::leaf(1, "A", Some(70.0), 10.0),
            SetupItem::leaf(2, "B", None, 10.0),
        ];
        assert!(validate_gradebook_weights(&ok, "Root level", "x").is_ok());

        let over = vec![
            SetupItem::leaf(1, "A", Some(80.0), 10.0),
            SetupItem::leaf(2, "B", Some(30.0), 10.0),
            SetupItem::leaf(3, "C", None, 10.0),
        ];
        let msg = message(validate_gradebook_weights(&over, "Root level", "Cannot create item"));
        assert!(msg.contains("110.00%"), "{}", msg);
        assert!(msg.contains("exceeds 100%"), "{}", msg);
    }

    #[test]
    fn extra_credit_is_ignored() {
        let items = vec![
            SetupItem::leaf(1, "A", Some(100.0), 10.0),
            SetupItem::leaf(2, "Bonus", Some(15.0), 10.0).with_extra_credit(),
        ];
        assert!(validate_gradebook_weights(&items, "Root level", "x").is_ok());
    }

    #[test]
    fn only_extra_credit_level_still_descends() {
        let items = vec![SetupItem::category(
            1,
            "Bonus",
            Some(5.0),
            vec![
                SetupItem::leaf(2, "A", Some(10.0), 10.0),
                SetupItem::leaf(3, "B", Some(10.0), 10.0),
            ],
        )
        .with_extra_credit()];
        let msg = message(validate_gradebook_weights(&items, "Root level", "x"));
        assert!(msg.contains("Root level > Bonus"), "{}", msg);
        assert!(msg.contains("20.00%"), "{}", msg);
    }

    #[test]
    fn nested_level_path_is_reported() {
        let items = vec![SetupItem::category(
            1,
            "Coursework",
            None,
            vec![SetupItem::category(
                2,
                "Labs",
                None,
                vec![
                    SetupItem::leaf(3, "Lab 1", Some(90.0), 10.0),
                    SetupItem::leaf(4, "Lab 2", Some(20.0), 10.0),
                ],
            )],
        )];
        let msg = message(validate_gradebook_weights(&items, "Root level", "x"));
        assert!(msg.contains("Root level > Coursework > Labs"), "{}", msg);
    }

    #[test]
    fn empty_tree_is_valid() {
        assert!(validate_gradebook_weights(&[], "Root level", "x").is_ok());
    }
}
