use super::types::{SetupItem, SetupItemWithCalculations, FULL_WEIGHT};

/// Annotates every node with `adjusted_weight` and `auto_weighted_zero`.
///
/// Children are processed before their category is classified, so a category only knows
/// whether it is auto-weighted-zero once all of its descendants are done. Distribution then
/// runs per sibling group:
///
/// - auto-weighted-zero categories get `0` and stay out of the pool;
/// - extra-credit nodes keep their own weight (or `None`) and stay out of the pool;
/// - everything else is participating; unweighted participants split
///   `max(0, 100 - sum(specified))` evenly.
pub fn calculate_adjusted_weights(items: &[SetupItem]) -> Vec<SetupItemWithCalculations> {
    let mut out: Vec<SetupItemWithCalculations> = items.iter().map(classify).collect();
    distribute(&mut out);
    out
}

fn classify(item: &SetupItem) -> SetupItemWithCalculations {
    let grade_items = if item.is_category() {
        Some(calculate_adjusted_weights(item.children()))
    } else {
        None
    };

    let auto_weighted_zero = item.is_category()
        && item.weight.is_none()
        && !grade_items
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .any(contributes_to_base);

    SetupItemWithCalculations {
        id: item.id,
        kind: item.kind,
        name: item.name.clone(),
        weight: item.weight,
        max_grade: item.max_grade,
        extra_credit: item.extra_credit,
        adjusted_weight: None,
        auto_weighted_zero,
        overall_weight: None,
        weight_explanation: None,
        grade_items,
    }
}

/// A child keeps its parent category alive: a regular leaf, or a regular category that is
/// not itself auto-weighted-zero.
fn contributes_to_base(child: &SetupItemWithCalculations) -> bool {
    !child.extra_credit && !child.auto_weighted_zero
}

fn distribute(siblings: &mut [SetupItemWithCalculations]) {
    let mut specified_total = 0.0_f64;
    let mut unweighted_count = 0_usize;
    for s in siblings.iter() {
        if s.auto_weighted_zero || s.extra_credit {
            continue;
        }
        match s.weight {
            Some(w) => specified_total += w,
            None => unweighted_count += 1,
        }
    }

    let remaining = (FULL_WEIGHT - specified_total).max(0.0);
    let share = if unweighted_count > 0 {
        Some(remaining / unweighted_count as f64)
    } else {
        None
    };

    for s in siblings.iter_mut() {
        s.adjusted_weight = if s.auto_weighted_zero {
            Some(0.0)
        } else if s.extra_credit {
            s.weight
        } else {
            s.weight.or(share)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjusted(items: &[SetupItemWithCalculations]) -> Vec<Option<f64>> {
        items.iter().map(|i| i.adjusted_weight).collect()
    }

    #[test]
    fn specified_weights_pass_through() {
        let out = calculate_adjusted_weights(&[
            SetupItem::leaf(1, "A", Some(40.0), 10.0),
            SetupItem::leaf(2, "B", Some(60.0), 10.0),
        ]);
        assert_eq!(adjusted(&out), vec![Some(40.0), Some(60.0)]);
        assert!(out.iter().all(|i| !i.auto_weighted_zero));
    }

    #[test]
    fn remainder_is_split_evenly() {
        let out = calculate_adjusted_weights(&[
            SetupItem::leaf(1, "A", Some(40.0), 10.0),
            SetupItem::leaf(2, "B", None, 10.0),
            SetupItem::leaf(3, "C", None, 10.0),
        ]);
        assert_eq!(adjusted(&out), vec![Some(40.0), Some(30.0), Some(30.0)]);
    }

    #[test]
    fn over_allocation_leaves_zero_remainder() {
        let out = calculate_adjusted_weights(&[
            SetupItem::leaf(1, "A", Some(120.0), 10.0),
            SetupItem::leaf(2, "B", None, 10.0),
        ]);
        assert_eq!(out[1].adjusted_weight, Some(0.0));
    }

    #[test]
    fn empty_unweighted_category_is_auto_zero() {
        let out = calculate_adjusted_weights(&[
            SetupItem::leaf(1, "A", None, 10.0),
            SetupItem::category(2, "Empty", None, Vec::new()),
        ]);
        assert!(out[1].auto_weighted_zero);
        assert_eq!(out[1].adjusted_weight, Some(0.0));
        assert_eq!(out[0].adjusted_weight, Some(100.0));
    }

    #[test]
    fn weighted_empty_category_is_not_auto_zero() {
        let out = calculate_adjusted_weights(&[
            SetupItem::leaf(1, "A", None, 10.0),
            SetupItem::category(2, "Reserved", Some(20.0), Vec::new()),
        ]);
        assert!(!out[1].auto_weighted_zero);
        assert_eq!(adjusted(&out), vec![Some(80.0), Some(20.0)]);
    }

    #[test]
    fn category_with_only_extra_credit_leaves_is_auto_zero() {
        let out = calculate_adjusted_weights(&[
            SetupItem::leaf(1, "A", None, 10.0),
            SetupItem::category(
                2,
                "Bonus work",
                None,
                vec![SetupItem::leaf(3, "Bonus", Some(5.0), 10.0).with_extra_credit()],
            ),
        ]);
        assert!(out[1].auto_weighted_zero);
        assert_eq!(out[0].adjusted_weight, Some(100.0));
        assert_eq!(out[1].children()[0].adjusted_weight, Some(5.0));
    }

    #[test]
    fn auto_zero_propagates_through_nested_empty_categories() {
        let out = calculate_adjusted_weights(&[SetupItem::category(
            1,
            "Outer",
            None,
            vec![
                SetupItem::category(2, "Inner A", None, Vec::new()),
                SetupItem::category(3, "Inner B", None, Vec::new()),
            ],
        )]);
        assert!(out[0].auto_weighted_zero);
        assert!(out[0].children().iter().all(|c| c.auto_weighted_zero));
    }

    #[test]
    fn regular_leaf_keeps_category_alive_beside_auto_zero_subcategory() {
        let out = calculate_adjusted_weights(&[SetupItem::category(
            1,
            "Outer",
            None,
            vec![
                SetupItem::leaf(2, "Essay", None, 10.0),
                SetupItem::category(3, "Empty", None, Vec::new()),
            ],
        )]);
        assert!(!out[0].auto_weighted_zero);
        assert_eq!(out[0].adjusted_weight, Some(100.0));
        assert_eq!(out[0].children()[0].adjusted_weight, Some(100.0));
    }

    #[test]
    fn sole_regular_category_receives_full_share() {
        let out = calculate_adjusted_weights(&[SetupItem::category(
            1,
            "Only",
            None,
            vec![SetupItem::leaf(2, "A", None, 10.0)],
        )]);
        assert!(!out[0].auto_weighted_zero);
        assert_eq!(out[0].adjusted_weight, Some(100.0));
    }

    #[test]
    fn unweighted_extra_credit_gets_no_share() {
        let out = calculate_adjusted_weights(&[
            SetupItem::leaf(1, "A", None, 10.0),
            SetupItem::leaf(2, "Bonus", None, 10.0).with_extra_credit(),
        ]);
        assert_eq!(adjusted(&out), vec![Some(100.0), None]);
    }

    #[test]
    fn only_extra_credit_siblings_have_no_distributable_share() {
        let out = calculate_adjusted_weights(&[
            SetupItem::leaf(1, "Bonus A", Some(3.0), 10.0).with_extra_credit(),
            SetupItem::leaf(2, "Bonus B", None, 10.0).with_extra_credit(),
        ]);
        assert_eq!(adjusted(&out), vec![Some(3.0), None]);
    }

    #[test]
    fn leaves_are_never_auto_zero() {
        let out = calculate_adjusted_weights(&[SetupItem::leaf(1, "A", None, 10.0).with_extra_credit()]);
        assert!(!out[0].auto_weighted_zero);
        assert!(out[0].grade_items.is_none());
    }
}
