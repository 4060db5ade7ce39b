//! An in-memory implementation of the category store.
//!
//! Used by the test suite and by embedders that do not bring their own
//! persistence. Handles are cheap clones sharing one record set, so a
//! service and a test can observe the same store.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    Error,
    category::{Category, CategoryId},
    store::{CategoryFilter, CategoryStore},
};

#[derive(Debug)]
enum Staged {
    Add(Category),
    Update(Category),
    Remove(CategoryId),
}

#[derive(Debug, Default)]
struct State {
    records: Vec<Category>,
    staged: Vec<Staged>,
}

/// A category store backed by an in-memory record list.
///
/// Writes are journaled and only applied by
/// [save_changes](CategoryStore::save_changes), which either applies the
/// whole journal or, on a conflict (inserting a taken id, updating or
/// removing a missing record), fails without applying anything. A failed
/// commit discards the journal, so the handle stays usable for the next
/// operation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCategoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryCategoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose committed records are `categories`.
    pub fn with_categories(categories: Vec<Category>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                records: categories,
                staged: Vec::new(),
            })),
        }
    }

    /// A snapshot of the committed records, in insertion order.
    pub fn committed(&self) -> Result<Vec<Category>, Error> {
        Ok(self.lock()?.records.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, Error> {
        self.state
            .lock()
            .map_err(|error| Error::Store(format!("could not acquire the store lock: {error}")))
    }
}

impl CategoryStore for InMemoryCategoryStore {
    fn add(&self, category: Category) -> Result<(), Error> {
        self.lock()?.staged.push(Staged::Add(category));
        Ok(())
    }

    fn update(&self, category: Category) -> Result<(), Error> {
        self.lock()?.staged.push(Staged::Update(category));
        Ok(())
    }

    fn remove(&self, category: Category) -> Result<(), Error> {
        self.lock()?.staged.push(Staged::Remove(category.id));
        Ok(())
    }

    async fn find_one(&self, filter: CategoryFilter) -> Result<Option<Category>, Error> {
        let state = self.lock()?;

        Ok(state
            .records
            .iter()
            .find(|category| filter.matches(category))
            .cloned())
    }

    async fn find_all(&self, filter: CategoryFilter) -> Result<Vec<Category>, Error> {
        let state = self.lock()?;

        Ok(state
            .records
            .iter()
            .filter(|category| filter.matches(category))
            .cloned()
            .collect())
    }

    async fn exists_id(&self, id: CategoryId) -> Result<bool, Error> {
        let state = self.lock()?;

        Ok(state.records.iter().any(|category| category.id == id))
    }

    async fn save_changes(&self) -> Result<(), Error> {
        let mut state = self.lock()?;

        // The journal is taken up front: a failed commit must not leave it
        // behind to taint the next operation on this handle.
        let staged = std::mem::take(&mut state.staged);

        // The journal is replayed against a scratch copy so a conflict
        // midway leaves the committed records untouched.
        let mut records = state.records.clone();

        for staged in &staged {
            match staged {
                Staged::Add(category) => {
                    if records.iter().any(|record| record.id == category.id) {
                        return Err(Error::Store(format!(
                            "cannot insert category {}: id already taken",
                            category.id
                        )));
                    }

                    records.push(category.clone());
                }
                Staged::Update(category) => {
                    let record = records
                        .iter_mut()
                        .find(|record| record.id == category.id)
                        .ok_or_else(|| {
                            Error::Store(format!(
                                "cannot update category {}: record is gone",
                                category.id
                            ))
                        })?;

                    *record = category.clone();
                }
                Staged::Remove(id) => {
                    let index = records
                        .iter()
                        .position(|record| record.id == *id)
                        .ok_or_else(|| {
                            Error::Store(format!("cannot remove category {id}: record is gone"))
                        })?;

                    records.remove(index);
                }
            }
        }

        state.records = records;

        Ok(())
    }
}
