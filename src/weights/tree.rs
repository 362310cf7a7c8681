use super::types::{CategoryRecord, ItemRecord, SetupItem, SetupItemKind};
use std::collections::HashSet;
use tracing::warn;

fn leaf_from_record(item: &ItemRecord) -> SetupItem {
    let name = if item.name.trim().is_empty() {
        item.activity_module_name
            .clone()
            .unwrap_or_else(|| item.name.clone())
    } else {
        item.name.clone()
    };
    SetupItem {
        id: item.id,
        kind: item
            .activity_module_type
            .filter(|k| !k.is_category())
            .unwrap_or(SetupItemKind::ManualItem),
        name,
        weight: item.weight,
        max_grade: Some(item.max_grade),
        extra_credit: item.extra_credit,
        grade_items: None,
    }
}

fn collect_items(parent_id: Option<i64>, items: &[ItemRecord]) -> Vec<SetupItem> {
    items
        .iter()
        .filter(|i| i.category == parent_id)
        .map(leaf_from_record)
        .collect()
}

/// Builds the category nodes hanging off `parent_id`, each with its own items first and
/// sub-categories after.
pub fn build_category_structure(
    parent_id: Option<i64>,
    categories: &[CategoryRecord],
    items: &[ItemRecord],
) -> Vec<SetupItem> {
    let mut placed = HashSet::new();
    build_categories_under(parent_id, categories, items, &mut placed)
}

fn build_categories_under(
    parent_id: Option<i64>,
    categories: &[CategoryRecord],
    items: &[ItemRecord],
    placed: &mut HashSet<i64>,
) -> Vec<SetupItem> {
    let mut out = Vec::new();
    for cat in categories.iter().filter(|c| c.parent == parent_id) {
        // A parent chain can only revisit a category through malformed data.
        if !placed.insert(cat.id) {
            continue;
        }
        let mut grade_items = collect_items(Some(cat.id), items);
        grade_items.extend(build_categories_under(
            Some(cat.id),
            categories,
            items,
            placed,
        ));
        out.push(SetupItem {
            id: cat.id,
            kind: SetupItemKind::Category,
            name: cat.name.clone(),
            weight: cat.weight,
            max_grade: None,
            extra_credit: cat.extra_credit,
            grade_items: Some(grade_items),
        });
    }
    out
}

/// Root items first, then root categories (recursively expanded).
pub fn build_setup_tree(categories: &[CategoryRecord], items: &[ItemRecord]) -> Vec<SetupItem> {
    let mut placed = HashSet::new();
    let mut root = collect_items(None, items);
    root.extend(build_categories_under(None, categories, items, &mut placed));

    if placed.len() != categories.len() {
        let dropped: Vec<i64> = categories
            .iter()
            .map(|c| c.id)
            .filter(|id| !placed.contains(id))
            .collect();
        warn!(
            ?dropped,
            "categories unreachable from the gradebook root (dangling or cyclic parent)"
        );
    }

    root
}
