//! Materializes the flat category list into a nested tree view.

use std::collections::{HashMap, HashSet};

use crate::category::{Category, CategoryId, CategoryLinked};

/// Transform a flat category list into nested [CategoryLinked] trees.
///
/// Roots are the categories whose id never appears in another category's
/// children list; they come back in the same relative order as the input.
/// Every other category is indexed by id and materialized in place of its
/// id wherever a root's subtree references it. A child id that does not
/// resolve within `categories` is silently skipped, so a pre-filtered list
/// (e.g. one user's categories) nests cleanly.
///
/// The recursion has no cycle guard: the input must already satisfy the
/// forest invariant that every committed mutation is validated against.
/// This function is not responsible for cycle safety.
pub fn nest_categories(categories: &[Category]) -> Vec<CategoryLinked> {
    let child_ids: HashSet<CategoryId> = categories
        .iter()
        .flat_map(|category| category.children.iter().copied())
        .collect();

    let candidates: HashMap<CategoryId, &Category> = categories
        .iter()
        .filter(|category| child_ids.contains(&category.id))
        .map(|category| (category.id, category))
        .collect();

    categories
        .iter()
        .filter(|category| !child_ids.contains(&category.id))
        .map(|root| materialize(root, &candidates))
        .collect()
}

fn materialize(category: &Category, candidates: &HashMap<CategoryId, &Category>) -> CategoryLinked {
    let mut linked = category.into_linked();

    for child_id in &category.children {
        if let Some(child) = candidates.get(child_id) {
            linked.children.push(materialize(child, candidates));
        }
    }

    linked
}
