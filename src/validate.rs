//! Read-only validation of candidate categories against the committed
//! hierarchy.
//!
//! Every mutation in [CategoryService](crate::CategoryService) runs these
//! checks before staging a single write, so a failed validation can never
//! leave a partially applied operation behind.

use std::collections::HashSet;

use crate::{
    Error,
    category::{Category, CategoryId, UserId},
    store::{CategoryFilter, CategoryStore},
};

/// Verify a candidate category without touching the store's write side.
///
/// Checks, in order: non-nil category, user and child ids; that every listed
/// child exists and is owned by the candidate's user; and, if a limit is
/// present, that the limit is consistent with the candidate's parent and
/// children ([verify_limit]).
///
/// Name and color well-formedness is enforced by the
/// [CategoryName](crate::CategoryName) and [Color](crate::Color) types and
/// needs no re-checking here.
pub async fn verify_category<S>(store: &S, category: &Category) -> Result<(), Error>
where
    S: CategoryStore,
{
    if category.id.is_nil() {
        return Err(Error::InvalidId("category id"));
    }

    if category.user_id.is_nil() {
        return Err(Error::InvalidId("user id"));
    }

    if category.children.iter().any(|child_id| child_id.is_nil()) {
        return Err(Error::InvalidId("category child id"));
    }

    let children = verify_children(store, category).await?;
    verify_limit(store, category, &children).await
}

/// Verify that every id in `category.children` refers to an existing
/// category owned by `category.user_id`.
///
/// Returns the fetched children; [verify_limit] reuses them for the limit
/// sum.
///
/// # Errors
///
/// This function will return an [Error::CategoryNotFound] for the first
/// missing child and an [Error::CategoryNotAccessible] for the first child
/// with a different owner.
pub async fn verify_children<S>(store: &S, category: &Category) -> Result<Vec<Category>, Error>
where
    S: CategoryStore,
{
    if category.children.is_empty() {
        return Ok(Vec::new());
    }

    let children = store
        .find_all(CategoryFilter::IdIn(category.children.clone()))
        .await?;

    let missing = category
        .children
        .iter()
        .find(|id| !children.iter().any(|child| child.id == **id));
    if let Some(missing) = missing {
        tracing::error!("category {missing} does not exist");
        return Err(Error::CategoryNotFound(*missing));
    }

    let inaccessible = children
        .iter()
        .find(|child| child.user_id != category.user_id);
    if let Some(inaccessible) = inaccessible {
        tracing::error!("category {} is not accessible", inaccessible.id);
        return Err(Error::CategoryNotAccessible(inaccessible.id));
    }

    Ok(children)
}

/// Verify the limit of `category` against its parent and its direct
/// children.
///
/// A category without a limit always passes. `children` must be the fetched
/// records for `category.children`; children without a limit contribute zero
/// to the sum. Only the direct parent and direct children are bounded,
/// deeper ancestors and descendants are not consulted.
///
/// # Errors
///
/// This function will return an [Error::NonPositiveLimitAmount],
/// [Error::LimitExceedsParent], [Error::LimitBelowChildren] or
/// [Error::NonPositiveLimitPeriod], checked in that order.
pub async fn verify_limit<S>(
    store: &S,
    category: &Category,
    children: &[Category],
) -> Result<(), Error>
where
    S: CategoryStore,
{
    let Some(limit) = &category.limit else {
        return Ok(());
    };

    let parent = store
        .find_one(CategoryFilter::WithChild(category.id))
        .await?;
    let child_sum: f64 = children
        .iter()
        .filter_map(|child| child.limit.as_ref())
        .map(|limit| limit.amount)
        .sum();

    if limit.amount <= 0.0 {
        tracing::error!("category {} has a non-positive limit amount", category.id);
        return Err(Error::NonPositiveLimitAmount);
    }

    if let Some(parent_limit) = parent.as_ref().and_then(|parent| parent.limit.as_ref())
        && parent_limit.amount < limit.amount
    {
        tracing::error!("category {} exceeds its parent's limit", category.id);
        return Err(Error::LimitExceedsParent {
            amount: limit.amount,
            parent_amount: parent_limit.amount,
        });
    }

    if child_sum != 0.0 && limit.amount < child_sum {
        tracing::error!("category {} cannot cover its children's limits", category.id);
        return Err(Error::LimitBelowChildren {
            amount: limit.amount,
            child_sum,
        });
    }

    if limit.period_days <= 0 {
        tracing::error!("category {} has a non-positive limit period", category.id);
        return Err(Error::NonPositiveLimitPeriod);
    }

    Ok(())
}

/// Verify that assigning `children` to the category with `category_id` keeps
/// the committed graph free of cycles.
///
/// Walks the committed children edges breadth-first from every proposed
/// child; reaching `category_id` (including a proposed child that *is*
/// `category_id`) is a cycle. Ids absent from the store are dead ends, not
/// errors, because child existence is validated separately.
///
/// The check only covers the edited node's children list. It is sufficient
/// because every committed state already passed it; repairing a pre-existing
/// cycle is out of contract.
pub async fn verify_cycle_free<S>(
    store: &S,
    category_id: CategoryId,
    children: &[CategoryId],
) -> Result<(), Error>
where
    S: CategoryStore,
{
    let mut visited: HashSet<CategoryId> = HashSet::new();
    let mut frontier: Vec<CategoryId> = children.to_vec();

    while !frontier.is_empty() {
        if frontier.contains(&category_id) {
            tracing::error!("the children of category {category_id} produce a cycle");
            return Err(Error::CyclicChildren(category_id));
        }

        let unvisited: Vec<CategoryId> = frontier
            .into_iter()
            .filter(|id| visited.insert(*id))
            .collect();
        if unvisited.is_empty() {
            break;
        }

        frontier = store
            .find_all(CategoryFilter::IdIn(unvisited))
            .await?
            .into_iter()
            .flat_map(|category| category.children)
            .collect();
    }

    Ok(())
}

/// Verify that the user may operate on the category with `category_id`, and
/// fetch it.
///
/// # Errors
///
/// This function will return an [Error::InvalidId] if either id is nil, an
/// [Error::CategoryNotFound] if no such category is committed, and an
/// [Error::CategoryNotAccessible] if it belongs to a different user.
pub async fn verify_access<S>(
    store: &S,
    category_id: CategoryId,
    user_id: UserId,
) -> Result<Category, Error>
where
    S: CategoryStore,
{
    if category_id.is_nil() {
        return Err(Error::InvalidId("category id"));
    }

    if user_id.is_nil() {
        return Err(Error::InvalidId("user id"));
    }

    let entity = store
        .find_one(CategoryFilter::WithId(category_id))
        .await?
        .ok_or_else(|| {
            tracing::error!("category {category_id} does not exist");
            Error::CategoryNotFound(category_id)
        })?;

    if entity.user_id != user_id {
        tracing::error!("category {category_id} is not accessible");
        return Err(Error::CategoryNotAccessible(category_id));
    }

    Ok(entity)
}


#[cfg(test)]
mod verify_children_tests {
    use uuid::Uuid;

    use crate::{
        Error,
        category::{Category, CategoryName, Color},
        memory_store::InMemoryCategoryStore,
    };

    use super::verify_children;

    fn test_category(name: &str, user_id: Uuid) -> Category {
        Category::new(
            user_id,
            CategoryName::new_unchecked(name),
            Color::new_unchecked("rgb(0,0,0)"),
        )
    }

    #[tokio::test]
    async fn empty_children_list_passes_without_queries() {
        let store = InMemoryCategoryStore::new();
        let category = test_category("Groceries", Uuid::now_v7());

        let result = verify_children(&store, &category).await;

        assert_eq!(result, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn fails_on_missing_child() {
        let user_id = Uuid::now_v7();
        let child = test_category("Food", user_id);
        let missing_id = Uuid::now_v7();
        let mut parent = test_category("Groceries", user_id);
        parent.children = vec![child.id, missing_id];
        let store = InMemoryCategoryStore::with_categories(vec![child]);

        let result = verify_children(&store, &parent).await;

        assert_eq!(result, Err(Error::CategoryNotFound(missing_id)));
    }

    #[tokio::test]
    async fn fails_on_foreign_child() {
        let user_id = Uuid::now_v7();
        let foreign_child = test_category("Food", Uuid::now_v7());
        let mut parent = test_category("Groceries", user_id);
        parent.children = vec![foreign_child.id];
        let store = InMemoryCategoryStore::with_categories(vec![foreign_child.clone()]);

        let result = verify_children(&store, &parent).await;

        assert_eq!(result, Err(Error::CategoryNotAccessible(foreign_child.id)));
    }

    #[tokio::test]
    async fn returns_the_fetched_children() {
        let user_id = Uuid::now_v7();
        let first = test_category("Food", user_id);
        let second = test_category("Drinks", user_id);
        let mut parent = test_category("Groceries", user_id);
        parent.children = vec![first.id, second.id];
        let store = InMemoryCategoryStore::with_categories(vec![first.clone(), second.clone()]);

        let result = verify_children(&store, &parent).await;

        assert_eq!(result, Ok(vec![first, second]));
    }
}


#[cfg(test)]
mod verify_cycle_free_tests {
    use uuid::Uuid;

    use crate::{
        Error,
        category::{Category, CategoryName, Color},
        memory_store::InMemoryCategoryStore,
    };

    use super::verify_cycle_free;

    fn test_category(name: &str) -> Category {
        Category::new(
            Uuid::now_v7(),
            CategoryName::new_unchecked(name),
            Color::new_unchecked("rgb(0,0,0)"),
        )
    }

    #[tokio::test]
    async fn passes_on_empty_children() {
        let store = InMemoryCategoryStore::new();

        let result = verify_cycle_free(&store, Uuid::now_v7(), &[]).await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn fails_on_self_reference() {
        let store = InMemoryCategoryStore::new();
        let category_id = Uuid::now_v7();

        let result = verify_cycle_free(&store, category_id, &[category_id]).await;

        assert_eq!(result, Err(Error::CyclicChildren(category_id)));
    }

    #[tokio::test]
    async fn fails_when_a_descendant_points_back() {
        // grandchild -> target closes the loop target -> child -> grandchild.
        let target = test_category("Target");
        let mut grandchild = test_category("Grandchild");
        grandchild.children = vec![target.id];
        let mut child = test_category("Child");
        child.children = vec![grandchild.id];
        let store =
            InMemoryCategoryStore::with_categories(vec![target.clone(), child.clone(), grandchild]);

        let result = verify_cycle_free(&store, target.id, &[child.id]).await;

        assert_eq!(result, Err(Error::CyclicChildren(target.id)));
    }

    #[tokio::test]
    async fn passes_on_a_deep_chain_without_cycles() {
        let grandchild = test_category("Grandchild");
        let mut child = test_category("Child");
        child.children = vec![grandchild.id];
        let store = InMemoryCategoryStore::with_categories(vec![child.clone(), grandchild]);

        let result = verify_cycle_free(&store, Uuid::now_v7(), &[child.id]).await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn shared_descendants_are_visited_once() {
        // Both proposed children point at the same grandchild; the walk must
        // terminate without flagging a cycle.
        let shared = test_category("Shared");
        let mut left = test_category("Left");
        left.children = vec![shared.id];
        let mut right = test_category("Right");
        right.children = vec![shared.id];
        let store =
            InMemoryCategoryStore::with_categories(vec![left.clone(), right.clone(), shared]);

        let result = verify_cycle_free(&store, Uuid::now_v7(), &[left.id, right.id]).await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn missing_ids_are_dead_ends() {
        let store = InMemoryCategoryStore::new();

        let result = verify_cycle_free(&store, Uuid::now_v7(), &[Uuid::now_v7()]).await;

        assert_eq!(result, Ok(()));
    }
}
