//! Budgetree is the category engine of a personal budgeting backend.
//!
//! Users organize their spending into a hierarchy of categories, each
//! optionally carrying a recurring spending limit. This crate owns that
//! hierarchy: it creates, updates and deletes categories, keeps the graph a
//! forest (no cycles), keeps parent/child limits numerically consistent, and
//! enforces per-user access boundaries on every mutation that touches more
//! than one record.
//!
//! The crate does not speak HTTP and does not own persistence. Controllers
//! call [CategoryService]; storage is injected through the [CategoryStore]
//! trait, with [InMemoryCategoryStore] as the bundled implementation.

#![warn(missing_docs)]

mod category;
mod id;
mod memory_store;
mod nest;
mod service;
mod store;
mod validate;

pub use category::{
    Category, CategoryId, CategoryLinked, CategoryName, Color, Limit, UserId,
};
pub use id::{ID_GENERATION_ATTEMPTS, generate_unique_id};
pub use memory_store::InMemoryCategoryStore;
pub use nest::nest_categories;
pub use service::CategoryService;
pub use store::{CategoryFilter, CategoryStore};

/// The errors that may occur in the category engine.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The caller supplied a nil id where a real one is required.
    ///
    /// The payload names the offending field. This is always caller-fixable
    /// and never worth retrying.
    #[error("{0} is invalid")]
    InvalidId(&'static str),

    /// An empty string was used to create a category name.
    #[error("category name must have at least one character")]
    EmptyCategoryName,

    /// A string that is not a recognized color encoding was used to create a
    /// category color.
    #[error("\"{0}\" is not a supported color encoding")]
    InvalidColor(String),

    /// A limit amount of zero or less was submitted.
    #[error("limit amount must be larger than zero")]
    NonPositiveLimitAmount,

    /// A limit period of zero or fewer days was submitted.
    #[error("limit period must be larger than zero")]
    NonPositiveLimitPeriod,

    /// A category limit was larger than the limit of its parent category.
    #[error("limit amount {amount} must not exceed the parent limit {parent_amount}")]
    LimitExceedsParent {
        /// The submitted limit amount.
        amount: f64,
        /// The limit amount of the category's parent.
        parent_amount: f64,
    },

    /// A category limit was smaller than the combined limits of its direct
    /// children.
    #[error("limit amount {amount} must cover the children's limit total {child_sum}")]
    LimitBelowChildren {
        /// The submitted limit amount.
        amount: f64,
        /// The sum of the limit amounts over the category's direct children.
        child_sum: f64,
    },

    /// The submitted children list would make a category reachable from
    /// itself.
    #[error("the children of category {0} would produce a cyclic relationship")]
    CyclicChildren(CategoryId),

    /// The referenced category (target or listed child) does not exist.
    #[error("category {0} does not exist")]
    CategoryNotFound(CategoryId),

    /// The referenced category exists but belongs to a different user.
    #[error("category {0} is not accessible")]
    CategoryNotAccessible(CategoryId),

    /// The id allocator exhausted its retries without finding a free id.
    ///
    /// This is a transient infrastructure fault; the whole operation is safe
    /// to retry.
    #[error("could not generate a unique category id")]
    IdGeneration,

    /// The category store failed, e.g. a commit conflict or an I/O fault.
    ///
    /// Store failures are surfaced unchanged and are not classified further
    /// by this crate.
    #[error("category store error: {0}")]
    Store(String),
}
