use super::types::{
    format_percent, ExtraCreditEntry, SetupItemKind, SetupItemWithCalculations, Totals,
    FULL_WEIGHT, MAX_ANCESTOR_DEPTH,
};
use crate::error::WeightError;
use std::collections::HashSet;
use tracing::warn;

/// Flattened view of one tree node. `parent` indexes into the same arena.
#[derive(Debug, Clone)]
pub(crate) struct ChainNode {
    pub id: i64,
    pub kind: SetupItemKind,
    pub name: String,
    pub adjusted_weight: Option<f64>,
    pub extra_credit: bool,
    pub max_grade: Option<f64>,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChainWeight {
    pub percent: f64,
    pub explanation: String,
}

fn flatten(
    items: &[SetupItemWithCalculations],
    parent: Option<usize>,
    out: &mut Vec<ChainNode>,
) {
    for item in items {
        let idx = out.len();
        out.push(ChainNode {
            id: item.id,
            kind: item.kind,
            name: item.name.clone(),
            adjusted_weight: item.adjusted_weight,
            extra_credit: item.extra_credit,
            max_grade: item.max_grade,
            parent,
        });
        if item.is_category() {
            flatten(item.children(), Some(idx), out);
        }
    }
}

fn term(name: &str, weight: f64) -> String {
    format!("{} ({}%)", name, format_percent(weight))
}

/// Multiplies `adjusted_weight / 100` from `start` up through every ancestor.
///
/// Ancestors without an adjusted weight are skipped (multiply by one). A repeated ancestor or
/// a chain longer than `MAX_ANCESTOR_DEPTH` stops the walk; the product so far is kept.
pub(crate) fn chain_weight(nodes: &[ChainNode], start: usize) -> Option<ChainWeight> {
    let node = nodes.get(start)?;
    let own = node.adjusted_weight?;

    let mut factor = own / FULL_WEIGHT;
    let mut terms = vec![term(&node.name, own)];
    let mut visited: HashSet<usize> = HashSet::new();
    visited.insert(start);

    let mut cursor = node.parent;
    let mut depth = 0_usize;
    while let Some(idx) = cursor {
        if depth >= MAX_ANCESTOR_DEPTH {
            report_broken_chain(node, format!("exceeded {} ancestors", MAX_ANCESTOR_DEPTH));
            break;
        }
        if !visited.insert(idx) {
            report_broken_chain(node, format!("ancestor at position {} repeats", idx));
            break;
        }
        let Some(ancestor) = nodes.get(idx) else {
            report_broken_chain(node, format!("ancestor index {} out of range", idx));
            break;
        };
        if let Some(w) = ancestor.adjusted_weight {
            factor *= w / FULL_WEIGHT;
            terms.push(term(&ancestor.name, w));
        }
        cursor = ancestor.parent;
        depth += 1;
    }

    terms.reverse();
    let percent = factor * FULL_WEIGHT;
    Some(ChainWeight {
        percent,
        explanation: format!("{} = {}%", terms.join(" × "), format_percent(percent)),
    })
}

fn report_broken_chain(node: &ChainNode, reason: String) {
    let e = WeightError::UnresolvableAncestorChain {
        node: format!("{} {} ({})", node.kind.as_str(), node.id, node.name),
        reason,
    };
    warn!(error = %e, "using partial overall weight");
}

fn write_back(
    items: &mut [SetupItemWithCalculations],
    results: &[Option<ChainWeight>],
    cursor: &mut usize,
) {
    for item in items.iter_mut() {
        let idx = *cursor;
        *cursor += 1;
        if item.is_category() {
            item.overall_weight = None;
            item.weight_explanation = None;
            if let Some(children) = item.grade_items.as_mut() {
                write_back(children, results, cursor);
            }
        } else {
            let r = results.get(idx).cloned().flatten();
            item.overall_weight = r.as_ref().map(|c| c.percent);
            item.weight_explanation = r.map(|c| c.explanation);
        }
    }
}

/// Fills `overall_weight` / `weight_explanation` on every leaf and returns the totals.
///
/// Expects a tree that already went through `calculate_adjusted_weights`.
pub fn calculate_overall_weights(items: &mut [SetupItemWithCalculations]) -> Totals {
    let mut nodes = Vec::new();
    flatten(items, None, &mut nodes);

    let results: Vec<Option<ChainWeight>> = (0..nodes.len())
        .map(|idx| chain_weight(&nodes, idx))
        .collect();

    let mut cursor = 0_usize;
    write_back(items, &results, &mut cursor);

    let mut totals = Totals::default();
    for (node, result) in nodes.iter().zip(results.iter()) {
        let overall = result.as_ref().map(|c| c.percent);
        if node.kind.is_category() {
            if node.extra_credit {
                totals.extra_credit_total += overall.unwrap_or(0.0);
                totals.extra_credit_categories.push(entry(node, overall));
            }
            continue;
        }

        totals.total_max_grade += node.max_grade.unwrap_or(0.0);
        if node.extra_credit {
            totals.extra_credit_total += overall.unwrap_or(0.0);
            totals.extra_credit_items.push(entry(node, overall));
        } else {
            totals.base_total += overall.unwrap_or(0.0);
        }
    }

    // Not derived from base_total; that sum carries float drift.
    totals.calculated_total = FULL_WEIGHT + totals.extra_credit_total;
    totals
}

fn entry(node: &ChainNode, overall_weight: Option<f64>) -> ExtraCreditEntry {
    ExtraCreditEntry {
        id: node.id,
        kind: node.kind,
        name: node.name.clone(),
        weight: node.adjusted_weight,
        overall_weight,
    }
}
