//! Unique id allocation for new categories.

use uuid::Uuid;

use crate::{Error, category::CategoryId};

/// How many freshly generated ids [generate_unique_id] tries after the
/// caller's candidate.
pub const ID_GENERATION_ATTEMPTS: usize = 10;

/// Get an id that is confirmed absent from the store.
///
/// Tries `candidate` first, then up to [ID_GENERATION_ATTEMPTS] fresh
/// version-7 UUIDs, asking `exists` about each one. Errors returned by
/// `exists` are propagated unchanged.
///
/// # Errors
///
/// This function will return an [Error::IdGeneration] if every tried id was
/// already taken.
pub async fn generate_unique_id<F>(candidate: CategoryId, mut exists: F) -> Result<CategoryId, Error>
where
    F: AsyncFnMut(CategoryId) -> Result<bool, Error>,
{
    let mut id = candidate;

    for _ in 0..=ID_GENERATION_ATTEMPTS {
        if !exists(id).await? {
            return Ok(id);
        }

        id = Uuid::now_v7();
    }

    tracing::error!("could not generate a unique id, started from {candidate}");
    Err(Error::IdGeneration)
}
