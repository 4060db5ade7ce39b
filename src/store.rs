//! Defines the category store trait and the query predicates it must
//! support.
//!
//! The store is injected into [CategoryService](crate::CategoryService);
//! this crate never talks to a database directly.

use crate::{
    Error,
    category::{Category, CategoryId, UserId},
};

/// A predicate over categories that a [CategoryStore] can evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryFilter {
    /// Matches the category with the given id.
    WithId(CategoryId),
    /// Matches every category owned by the given user.
    OwnedBy(UserId),
    /// Matches every category whose children list contains the given id.
    WithChild(CategoryId),
    /// Matches every category whose id is in the given set.
    IdIn(Vec<CategoryId>),
}

impl CategoryFilter {
    /// Whether `category` satisfies the predicate.
    pub fn matches(&self, category: &Category) -> bool {
        match self {
            CategoryFilter::WithId(id) => category.id == *id,
            CategoryFilter::OwnedBy(user_id) => category.user_id == *user_id,
            CategoryFilter::WithChild(child_id) => category.children.contains(child_id),
            CategoryFilter::IdIn(ids) => ids.contains(&category.id),
        }
    }
}

/// Stores the flat category records of all users.
///
/// Writes are staged: [add](CategoryStore::add),
/// [update](CategoryStore::update) and [remove](CategoryStore::remove) have
/// no observable effect until [save_changes](CategoryStore::save_changes)
/// commits everything staged so far in one atomic step. Reads observe
/// committed state only.
///
/// Concurrent commits to the same records are the store's problem: an
/// implementation detecting a conflict fails `save_changes` with
/// [Error::Store], which callers surface unchanged without retrying.
#[allow(async_fn_in_trait)]
pub trait CategoryStore {
    /// Stage `category` for insertion.
    fn add(&self, category: Category) -> Result<(), Error>;

    /// Stage `category` as the new version of the record with the same id.
    fn update(&self, category: Category) -> Result<(), Error>;

    /// Stage the record with `category`'s id for deletion.
    fn remove(&self, category: Category) -> Result<(), Error>;

    /// Get the first committed category matching `filter`, if any.
    async fn find_one(&self, filter: CategoryFilter) -> Result<Option<Category>, Error>;

    /// Get all committed categories matching `filter`.
    async fn find_all(&self, filter: CategoryFilter) -> Result<Vec<Category>, Error>;

    /// Whether a committed category with the given id exists.
    async fn exists_id(&self, id: CategoryId) -> Result<bool, Error>;

    /// Commit all staged changes atomically.
    ///
    /// On failure nothing staged has been applied and the staged changes
    /// are discarded; the handle stays usable for subsequent operations.
    async fn save_changes(&self) -> Result<(), Error>;
}
