//! This file defines the `Category` type, its spending [Limit] and the
//! validated field types used to build one.
//!
//! A category is a user-owned budgeting bucket. Its `children` list contains
//! the ids of its sub-categories, which keeps the persisted representation
//! flat; [CategoryLinked] is the nested view derived from it.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Error;

/// Alias for the id type used for categories.
pub type CategoryId = Uuid;

/// Alias for the id type used for the user owning a category.
pub type UserId = Uuid;

/// The name of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// Leading and trailing whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is
    /// empty after trimming.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The display color of a category.
///
/// Recognized encodings are `rgb(r,g,b)` with each component in 0-255, and
/// hex `#rrggbb`. The string is stored as submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Color(String);

impl Color {
    /// Create a category color from a color encoding string.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidColor] if `color` is not a
    /// recognized color encoding.
    pub fn new(color: &str) -> Result<Self, Error> {
        let color = color.trim();

        if is_rgb_encoding(color) || is_hex_encoding(color) {
            Ok(Self(color.to_string()))
        } else {
            Err(Error::InvalidColor(color.to_string()))
        }
    }

    /// Create a category color without validation.
    ///
    /// The caller should ensure that the string is a recognized color
    /// encoding.
    pub fn new_unchecked(color: &str) -> Self {
        Self(color.to_string())
    }
}

fn is_rgb_encoding(color: &str) -> bool {
    let Some(components) = color
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(")"))
    else {
        return false;
    };

    let mut count = 0;

    for component in components.split(',') {
        if component.trim().parse::<u8>().is_err() {
            return false;
        }

        count += 1;
    }

    count == 3
}

fn is_hex_encoding(color: &str) -> bool {
    let Some(digits) = color.strip_prefix('#') else {
        return false;
    };

    digits.len() == 6 && digits.chars().all(|char| char.is_ascii_hexdigit())
}

impl AsRef<str> for Color {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::new(s)
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recurring spending cap attached to a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    /// The amount of money that may be spent per period.
    pub amount: f64,
    /// The length of the spending period in days.
    pub period_days: i64,
    /// When the limit was created.
    pub created_at: OffsetDateTime,
    /// When the limit was last modified.
    pub modified_at: OffsetDateTime,
}

impl Limit {
    /// Create a limit of `amount` per `period_days` days, timestamped now.
    ///
    /// The amount and period are validated when the category carrying the
    /// limit is submitted, not here.
    pub fn new(amount: f64, period_days: i64) -> Self {
        let now = OffsetDateTime::now_utc();

        Self {
            amount,
            period_days,
            created_at: now,
            modified_at: now,
        }
    }
}

/// A user-owned budgeting bucket, e.g. 'Groceries', 'Rent', 'Eating Out'.
///
/// This is the flat representation that is persisted: sub-categories are
/// referenced by id in `children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The id of the category.
    pub id: CategoryId,
    /// The id of the user that owns the category. Ownership never transfers.
    pub user_id: UserId,
    /// The name of the category.
    pub name: CategoryName,
    /// The display color of the category.
    pub color: Color,
    /// The ids of the category's direct sub-categories.
    pub children: Vec<CategoryId>,
    /// The recurring spending limit of the category, if any.
    pub limit: Option<Limit>,
    /// When the category was created.
    pub created_at: OffsetDateTime,
    /// When the category was last modified.
    pub modified_at: OffsetDateTime,
}

impl Category {
    /// Create a new category with a fresh id, no children and no limit.
    pub fn new(user_id: UserId, name: CategoryName, color: Color) -> Self {
        let now = OffsetDateTime::now_utc();

        Self {
            id: Uuid::now_v7(),
            user_id,
            name,
            color,
            children: Vec::new(),
            limit: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Copy the category's scalar fields into a [CategoryLinked] with no
    /// children.
    ///
    /// Used by [nest_categories](crate::nest_categories), which fills in the
    /// nested children.
    pub fn into_linked(&self) -> CategoryLinked {
        CategoryLinked {
            id: self.id,
            user_id: self.user_id,
            name: self.name.clone(),
            color: self.color.clone(),
            children: Vec::new(),
            limit: self.limit.clone(),
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }
}

/// A category with its sub-categories nested in place of their ids.
///
/// This view is derived on demand from a flat category list and never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryLinked {
    /// The id of the category.
    pub id: CategoryId,
    /// The id of the user that owns the category.
    pub user_id: UserId,
    /// The name of the category.
    pub name: CategoryName,
    /// The display color of the category.
    pub color: Color,
    /// The category's direct sub-categories, fully nested.
    pub children: Vec<CategoryLinked>,
    /// The recurring spending limit of the category, if any.
    pub limit: Option<Limit>,
    /// When the category was created.
    pub created_at: OffsetDateTime,
    /// When the category was last modified.
    pub modified_at: OffsetDateTime,
}
