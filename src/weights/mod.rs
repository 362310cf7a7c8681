//! Gradebook weight engine.
//!
//! Flat category/item records are turned into a setup tree, weights are distributed per
//! sibling group, and every leaf gets its share of the course total. The level validator
//! guards writes independently of the display pipeline.

mod adjusted;
mod overall;
mod tree;
mod types;
mod validate;

pub use adjusted::calculate_adjusted_weights;
pub use overall::calculate_overall_weights;
pub use tree::{build_category_structure, build_setup_tree};
pub use types::{
    format_percent, CategoryRecord, ExtraCreditEntry, GradebookSetup, GradebookSetupForUi,
    ItemRecord, SetupItem, SetupItemKind, SetupItemWithCalculations, Totals, FULL_WEIGHT,
    MAX_ANCESTOR_DEPTH, WEIGHT_TOLERANCE,
};
pub use validate::validate_gradebook_weights;

/// Level name used for the top of the tree in validation messages.
pub const ROOT_LEVEL: &str = "Root level";

pub fn gradebook_setup(categories: &[CategoryRecord], items: &[ItemRecord]) -> GradebookSetup {
    GradebookSetup {
        items: build_setup_tree(categories, items),
    }
}

pub fn gradebook_setup_for_ui(
    categories: &[CategoryRecord],
    items: &[ItemRecord],
) -> (GradebookSetupForUi, Totals) {
    let tree = build_setup_tree(categories, items);
    let mut items = calculate_adjusted_weights(&tree);
    let totals = calculate_overall_weights(&mut items);
    (GradebookSetupForUi { items }, totals)
}
