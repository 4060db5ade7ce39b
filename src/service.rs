//! Orchestrates category mutations against an injected [CategoryStore].
//!
//! Every operation is a single linear flow: validate everything against the
//! committed state, mutate working copies, then stage the writes and commit
//! them with one `save_changes` call. A failure anywhere before the commit
//! leaves the store untouched, and because nothing is staged until
//! validation has finished, cancelling the operation future mid-flight
//! cannot leave a partial commit behind either.

use std::collections::HashSet;

use time::OffsetDateTime;

use crate::{
    Error,
    category::{Category, CategoryId, Limit, UserId},
    id::generate_unique_id,
    store::{CategoryFilter, CategoryStore},
    validate::{verify_access, verify_category, verify_cycle_free},
};

/// Manages the category hierarchy of all users on top of a [CategoryStore].
#[derive(Debug, Clone)]
pub struct CategoryService<S> {
    store: S,
}

impl<S> CategoryService<S>
where
    S: CategoryStore,
{
    /// Create a service operating on `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying category store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a new category.
    ///
    /// The submitted id is only a candidate: the persisted category gets an
    /// id confirmed unique against the store. Returns a copy of the
    /// persisted category.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidId] for nil ids, an
    /// [Error::CategoryNotFound] / [Error::CategoryNotAccessible] for a
    /// missing or foreign child, a limit validation error per
    /// [Error::NonPositiveLimitAmount] and friends, an [Error::IdGeneration]
    /// if no unique id could be allocated, or an [Error::Store] failure from
    /// the commit.
    pub async fn create_category(&self, category: Category) -> Result<Category, Error> {
        tracing::info!("creating category {} for user {}", category.id, category.user_id);

        verify_category(&self.store, &category).await?;

        let mut category = category;
        category.id =
            generate_unique_id(category.id, async |id| self.store.exists_id(id).await).await?;

        self.store.add(category.clone())?;
        self.store.save_changes().await?;

        tracing::info!("created category {}", category.id);
        Ok(category)
    }

    /// Update a category, reparenting children as needed.
    ///
    /// Scalar fields (`name`, `color`, `limit`) are applied in place when
    /// changed. Every child id newly added to `category.children` is
    /// detached from its former parent; those former parents are updated in
    /// the same commit and returned alongside a copy of the submitted
    /// category (first element), deduplicated by id with the most recent
    /// version winning, so the caller sees every record the operation
    /// changed.
    ///
    /// # Errors
    ///
    /// In addition to the errors of
    /// [create_category](CategoryService::create_category), this function
    /// will return an [Error::CategoryNotAccessible] if a former parent
    /// belongs to a different user and an [Error::CyclicChildren] if the new
    /// children list would make the category reachable from itself. No
    /// writes are committed on failure.
    pub async fn update_category(&self, category: Category) -> Result<Vec<Category>, Error> {
        tracing::info!("updating category {}", category.id);

        verify_category(&self.store, &category).await?;
        let mut entity = verify_access(&self.store, category.id, category.user_id).await?;

        let mut result = vec![category.clone()];
        let mut changed = false;

        if entity.name != category.name {
            entity.name = category.name.clone();
            changed = true;
        }

        if entity.color != category.color {
            entity.color = category.color.clone();
            changed = true;
        }

        changed |= apply_limit(&mut entity, category.limit.clone());

        let mut former_parents = Vec::new();
        if entity.children != category.children {
            former_parents = self.detach_added_children(&entity, &category.children).await?;
            entity.children = category.children.clone();
            changed = true;

            verify_cycle_free(&self.store, entity.id, &entity.children).await?;
        }

        if changed {
            entity.modified_at = OffsetDateTime::now_utc();
        }

        self.store.update(entity)?;
        for parent in &former_parents {
            self.store.update(parent.clone())?;
        }
        self.store.save_changes().await?;

        result.extend(former_parents);

        tracing::info!("updated category {}, {} record(s) touched", category.id, result.len());
        Ok(result)
    }

    /// Remove every newly added child id from its current parent's children
    /// list.
    ///
    /// Returns the updated former parents, deduplicated by id. Nothing is
    /// staged here; the caller stages the returned copies once all
    /// validation has passed.
    async fn detach_added_children(
        &self,
        entity: &Category,
        new_children: &[CategoryId],
    ) -> Result<Vec<Category>, Error> {
        let mut detached: Vec<Category> = Vec::new();

        // An id listed twice must only be detached once, otherwise the
        // second pass re-reads the committed parent and undoes the first.
        let mut seen = HashSet::new();
        let added: Vec<CategoryId> = new_children
            .iter()
            .copied()
            .filter(|id| !entity.children.contains(id) && seen.insert(*id))
            .collect();
        for child_id in added {
            // A parent already touched in this pass supersedes its committed
            // version, otherwise an earlier detach would be lost.
            let parent = match detached
                .iter()
                .find(|parent| parent.children.contains(&child_id))
            {
                Some(parent) => Some(parent.clone()),
                None => {
                    self.store
                        .find_one(CategoryFilter::WithChild(child_id))
                        .await?
                }
            };

            let Some(mut parent) = parent else {
                continue;
            };
            if parent.id == entity.id {
                continue;
            }
            if parent.user_id != entity.user_id {
                tracing::error!("category {} is not accessible", parent.id);
                return Err(Error::CategoryNotAccessible(parent.id));
            }

            parent.children.retain(|id| *id != child_id);
            parent.modified_at = OffsetDateTime::now_utc();

            detached.retain(|elem| elem.id != parent.id);
            detached.push(parent);
        }

        Ok(detached)
    }

    /// Delete a category, stripping its id from its former parent's children
    /// list in the same commit. Returns a copy of the deleted category.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidId] for nil ids, an
    /// [Error::CategoryNotFound] if the category does not exist, an
    /// [Error::CategoryNotAccessible] if the category or its parent belongs
    /// to a different user, or an [Error::Store] failure from the commit.
    pub async fn delete_category(
        &self,
        category_id: CategoryId,
        user_id: UserId,
    ) -> Result<Category, Error> {
        tracing::info!("deleting category {category_id}");

        let entity = verify_access(&self.store, category_id, user_id).await?;

        let parent = self
            .store
            .find_one(CategoryFilter::WithChild(category_id))
            .await?;
        let parent = match parent {
            Some(mut parent) => {
                if parent.user_id != user_id {
                    tracing::error!("category {} is not accessible", parent.id);
                    return Err(Error::CategoryNotAccessible(parent.id));
                }

                parent.children.retain(|id| *id != category_id);
                Some(parent)
            }
            None => None,
        };

        if let Some(parent) = parent {
            self.store.update(parent)?;
        }
        self.store.remove(entity.clone())?;
        self.store.save_changes().await?;

        tracing::info!("deleted category {category_id}");
        Ok(entity)
    }

    /// Get a copy of the category with `category_id`.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidId] for nil ids, an
    /// [Error::CategoryNotFound] if the category does not exist and an
    /// [Error::CategoryNotAccessible] if it belongs to a different user.
    pub async fn get_category(
        &self,
        category_id: CategoryId,
        user_id: UserId,
    ) -> Result<Category, Error> {
        tracing::info!("reading category {category_id}");

        verify_access(&self.store, category_id, user_id).await
    }

    /// Get copies of all categories owned by `user_id`.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidId] if `user_id` is nil.
    pub async fn get_categories(&self, user_id: UserId) -> Result<Vec<Category>, Error> {
        tracing::info!("reading all categories of user {user_id}");

        if user_id.is_nil() {
            return Err(Error::InvalidId("user id"));
        }

        self.store.find_all(CategoryFilter::OwnedBy(user_id)).await
    }
}

/// Apply a limit transition to `entity` and report whether anything changed.
///
/// `present -> absent` clears the limit, `absent -> present` installs the
/// new limit object, and `present -> present` updates amount and period in
/// place, refreshing the limit's `modified_at`.
fn apply_limit(entity: &mut Category, new_limit: Option<Limit>) -> bool {
    match (entity.limit.take(), new_limit) {
        (None, None) => false,
        (Some(_), None) => true,
        (None, Some(new)) => {
            entity.limit = Some(new);
            true
        }
        (Some(mut current), Some(new)) => {
            if current.amount == new.amount && current.period_days == new.period_days {
                entity.limit = Some(current);
                false
            } else {
                current.amount = new.amount;
                current.period_days = new.period_days;
                current.modified_at = OffsetDateTime::now_utc();
                entity.limit = Some(current);
                true
            }
        }
    }
}

#[cfg(test)]
mod create_category_tests {
    use uuid::Uuid;

    use crate::{
        Error,
        category::{Category, CategoryName, Color, Limit},
        memory_store::InMemoryCategoryStore,
    };

    use super::CategoryService;

    fn test_category(name: &str, user_id: Uuid) -> Category {
        Category::new(
            user_id,
            CategoryName::new_unchecked(name),
            Color::new_unchecked("rgb(0,0,0)"),
        )
    }

    #[tokio::test]
    async fn creates_a_limited_category() {
        let store = InMemoryCategoryStore::new();
        let service = CategoryService::new(store.clone());
        let mut category = test_category("Rent", Uuid::now_v7());
        category.limit = Some(Limit::new(1000.0, 30));

        let created = service
            .create_category(category.clone())
            .await
            .expect("Could not create category");

        assert!(!created.id.is_nil());
        assert!(created.children.is_empty());
        assert_eq!(created.name, category.name);
        assert_eq!(created.limit, category.limit);
        assert_eq!(store.committed(), Ok(vec![created]));
    }

    #[tokio::test]
    async fn replaces_a_taken_candidate_id() {
        let existing = test_category("Groceries", Uuid::now_v7());
        let store = InMemoryCategoryStore::with_categories(vec![existing.clone()]);
        let service = CategoryService::new(store.clone());
        let mut candidate = test_category("Rent", Uuid::now_v7());
        candidate.id = existing.id;

        let created = service
            .create_category(candidate)
            .await
            .expect("Could not create category");

        assert_ne!(created.id, existing.id);
        assert_eq!(
            store.committed().expect("Could not read records").len(),
            2
        );
    }

    #[tokio::test]
    async fn adopts_existing_children() {
        let user_id = Uuid::now_v7();
        let child = test_category("Food", user_id);
        let store = InMemoryCategoryStore::with_categories(vec![child.clone()]);
        let service = CategoryService::new(store);
        let mut parent = test_category("Groceries", user_id);
        parent.children = vec![child.id];

        let created = service
            .create_category(parent)
            .await
            .expect("Could not create category");

        assert_eq!(created.children, vec![child.id]);
    }

    #[tokio::test]
    async fn fails_on_missing_child_and_commits_nothing() {
        let store = InMemoryCategoryStore::new();
        let service = CategoryService::new(store.clone());
        let missing_id = Uuid::now_v7();
        let mut category = test_category("Groceries", Uuid::now_v7());
        category.children = vec![missing_id];

        let result = service.create_category(category).await;

        assert_eq!(result, Err(Error::CategoryNotFound(missing_id)));
        assert_eq!(store.committed(), Ok(Vec::new()));
    }

    #[tokio::test]
    async fn fails_on_foreign_child() {
        let foreign_child = test_category("Food", Uuid::now_v7());
        let store = InMemoryCategoryStore::with_categories(vec![foreign_child.clone()]);
        let service = CategoryService::new(store.clone());
        let mut category = test_category("Groceries", Uuid::now_v7());
        category.children = vec![foreign_child.id];

        let result = service.create_category(category).await;

        assert_eq!(result, Err(Error::CategoryNotAccessible(foreign_child.id)));
        assert_eq!(store.committed(), Ok(vec![foreign_child]));
    }

    #[tokio::test]
    async fn fails_when_children_limits_exceed_the_new_limit() {
        let user_id = Uuid::now_v7();
        let mut child = test_category("Food", user_id);
        child.limit = Some(Limit::new(150.0, 30));
        let store = InMemoryCategoryStore::with_categories(vec![child.clone()]);
        let service = CategoryService::new(store);
        let mut parent = test_category("Groceries", user_id);
        parent.children = vec![child.id];
        parent.limit = Some(Limit::new(100.0, 30));

        let result = service.create_category(parent).await;

        assert_eq!(
            result,
            Err(Error::LimitBelowChildren {
                amount: 100.0,
                child_sum: 150.0
            })
        );
    }

    #[tokio::test]
    async fn fails_on_non_positive_limit() {
        let store = InMemoryCategoryStore::new();
        let service = CategoryService::new(store.clone());
        let mut category = test_category("Rent", Uuid::now_v7());
        category.limit = Some(Limit::new(-10.0, 30));

        let result = service.create_category(category).await;

        assert_eq!(result, Err(Error::NonPositiveLimitAmount));
        assert_eq!(store.committed(), Ok(Vec::new()));
    }

    #[tokio::test]
    async fn fails_on_nil_user_id() {
        let service = CategoryService::new(InMemoryCategoryStore::new());
        let category = test_category("Rent", Uuid::nil());

        let result = service.create_category(category).await;

        assert_eq!(result, Err(Error::InvalidId("user id")));
    }
}
